//! Conversion options and their validation.
//!
//! Option values are fully validated here, before any archive is read;
//! an invalid value is a fatal error. Defaults depend on the output
//! dialect: git uses `master` and an `invalid` email domain, svn uses
//! `trunk` and a `tags` container.

use std::fmt;

use crate::keyword::KeywordSet;

/// Output stream dialect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Git,
    Svn,
}

/// Fatal errors for invalid option values.
#[derive(Debug)]
#[non_exhaustive]
pub enum OptionError {
    /// A trunk or tags name violating the ref-name rules.
    BadName { detail: &'static str },
    /// A split threshold that is not a number.
    ThresholdNotANumber { value: String },
    /// A split threshold with a suffix other than `s`, `m`, `h` or `d`.
    ThresholdBadSuffix { value: String },
    /// `--tags` only applies to svn output.
    TagsWithGit,
    /// `--email-domain` only applies to git output.
    EmailWithSvn,
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadName { detail } => write!(f, "name {detail}"),
            Self::ThresholdNotANumber { value } => {
                write!(f, "split threshold '{value}' is not a number")
            }
            Self::ThresholdBadSuffix { value } => {
                write!(f, "split threshold '{value}' has invalid suffix")
            }
            Self::TagsWithGit => f.write_str("--tags is not valid for git output"),
            Self::EmailWithSvn => f.write_str("--email-domain is not valid for svn output"),
        }
    }
}

impl std::error::Error for OptionError {}

/// Resolved conversion options.
#[derive(Debug)]
pub struct Options {
    pub format: OutputFormat,
    /// Trunk ref name (git) or trunk directory (svn).
    pub trunk: String,
    /// Tags container directory (svn only).
    pub tags: String,
    /// Committer email domain (git only).
    pub email_domain: String,
    /// Changeset split threshold in seconds.
    pub split_threshold: u64,
    pub keywords: KeywordSet,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: OutputFormat::Git,
            trunk: "master".to_owned(),
            tags: "tags".to_owned(),
            email_domain: "invalid".to_owned(),
            split_threshold: 300,
            keywords: KeywordSet::with_defaults(),
            verbose: false,
        }
    }
}

impl Options {
    /// Default options for one output dialect.
    #[must_use]
    pub fn for_format(format: OutputFormat) -> Self {
        let mut opts = Self {
            format,
            ..Self::default()
        };
        if format == OutputFormat::Svn {
            opts.trunk = "trunk".to_owned();
        }
        opts
    }

    /// Builds options from raw command-line values.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        format: OutputFormat,
        trunk: Option<&str>,
        tags: Option<&str>,
        email_domain: Option<&str>,
        split_threshold: Option<&str>,
        no_default_keywords: bool,
        extra_keywords: &[String],
        verbose: bool,
    ) -> Result<Self, OptionError> {
        match format {
            OutputFormat::Git if tags.is_some() => return Err(OptionError::TagsWithGit),
            OutputFormat::Svn if email_domain.is_some() => return Err(OptionError::EmailWithSvn),
            _ => {}
        }

        let mut opts = Self::for_format(format);
        if let Some(trunk) = trunk {
            check_ref_name(trunk)?;
            opts.trunk = trunk.to_owned();
        }
        if let Some(tags) = tags {
            check_ref_name(tags)?;
            opts.tags = tags.to_owned();
        }
        if let Some(domain) = email_domain {
            opts.email_domain = domain.to_owned();
        }
        if let Some(threshold) = split_threshold {
            opts.split_threshold = parse_split_threshold(threshold)?;
        }

        opts.keywords = if no_default_keywords {
            KeywordSet::new()
        } else {
            KeywordSet::with_defaults()
        };
        for name in extra_keywords {
            opts.keywords.add(name);
        }
        opts.verbose = verbose;
        Ok(opts)
    }
}

/// Validates a trunk or tags name against the ref-name rules.
pub fn check_ref_name(name: &str) -> Result<(), OptionError> {
    let bytes = name.as_bytes();
    match bytes.first() {
        None => return Err(OptionError::BadName {
            detail: "must not be empty",
        }),
        Some(b'/') => {
            return Err(OptionError::BadName {
                detail: "must not start with a slash ('/')",
            })
        }
        Some(b'-') => {
            return Err(OptionError::BadName {
                detail: "must not start with a minus ('-')",
            })
        }
        Some(_) => {}
    }

    for (i, &b) in bytes.iter().enumerate() {
        if b == b'/' {
            match bytes.get(i + 1) {
                None => {
                    return Err(OptionError::BadName {
                        detail: "must not end with a slash ('/')",
                    })
                }
                Some(b'/') => {
                    return Err(OptionError::BadName {
                        detail: "must not contain consecutive slashes ('//')",
                    })
                }
                Some(_) => {}
            }
        } else if !b.is_ascii_alphanumeric() && !matches!(b, b'_' | b'+' | b'-' | b'.') {
            return Err(OptionError::BadName {
                detail: "may only contain letters, digits, underscore, plus, minus and period",
            });
        }
    }
    Ok(())
}

/// Parses a split threshold with an optional `s`/`m`/`h`/`d` suffix.
pub fn parse_split_threshold(value: &str) -> Result<u64, OptionError> {
    let digits: usize = value.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Err(OptionError::ThresholdNotANumber {
            value: value.to_owned(),
        });
    }
    let number: u64 =
        value[..digits]
            .parse()
            .map_err(|_| OptionError::ThresholdNotANumber {
                value: value.to_owned(),
            })?;
    let factor = match &value[digits..] {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => {
            return Err(OptionError::ThresholdBadSuffix {
                value: value.to_owned(),
            })
        }
    };
    Ok(number * factor)
}
