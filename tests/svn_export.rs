//! End-to-end svn dump scenarios over in-memory archives.

use cvscvt::{Converter, Options, OutputFormat};

fn convert(archives: &[(&str, bool, bool, &[u8])]) -> String {
    let mut cv = Converter::new(Options::for_format(OutputFormat::Svn), Vec::new());
    for &(path, executable, in_attic, bytes) in archives {
        cv.add_archive_path(path, executable, in_attic, bytes)
            .expect("archive parses");
    }
    let (out, _stats) = cv.finish().expect("conversion succeeds");
    String::from_utf8(out).expect("dump output is valid UTF-8 here")
}

const TAGGED: &[u8] = b"head\t1.1;\n\
    access;\n\
    symbols\tV1:1.1;\n\
    locks; strict;\n\
    \n\
    1.1\n\
    date\t2020.01.02.03.04.05;\tauthor alice;\tstate Exp;\n\
    branches;\n\
    next\t;\n\
    \n\
    desc\n\
    @@\n\
    \n\
    1.1\n\
    log\n\
    @hello\n\
    @\n\
    text\n\
    @hi\n\
    @\n";

#[test]
fn dump_opens_with_format_version_and_standard_dirs() {
    let out = convert(&[("a", false, false, TAGGED)]);
    assert!(out.starts_with("SVN-fs-dump-format-version: 2\n\n"));
    assert!(out.contains("Revision-number: 1\n"));
    assert!(out.contains("Node-path: trunk\nNode-kind: dir\nNode-action: add\n"));
    assert!(out.contains("Node-path: tags\nNode-kind: dir\nNode-action: add\n"));
    // Revision 1 carries no author, only date and log.
    assert!(out.contains("Standard project directories initialized by cvscvt."));
}

#[test]
fn commit_revision_carries_props_and_file_node() {
    let out = convert(&[("a", false, false, TAGGED)]);

    assert!(out.contains("Revision-number: 2\n"));
    assert!(out.contains("K 10\nsvn:author\nV 5\nalice\n"));
    assert!(out.contains("K 8\nsvn:date\nV 27\n2020-01-02T03:04:05.000000Z\n"));
    assert!(out.contains("K 7\nsvn:log\nV 6\nhello\n\n"));
    assert!(out.contains(
        "Node-path: trunk/a\nNode-kind: file\nNode-action: add\n\
         Text-content-length: 3\nContent-length: 3\n\nhi\n"
    ));
}

#[test]
fn tag_revision_copies_from_trunk() {
    let out = convert(&[("a", false, false, TAGGED)]);

    let tag_rev = out.find("Revision-number: 3\n").expect("tag revision");
    let tag_part = &out[tag_rev..];
    assert!(tag_part.contains("K 7\nsvn:log\nV 9\nMake tag\n\n"));
    assert!(tag_part.contains(
        "Node-path: tags/V1/a\nNode-kind: file\nNode-action: add\n\
         Node-copyfrom-rev: 2\nNode-copyfrom-path: trunk/a\n"
    ));
    // The tag's own directory is created first.
    let dir = tag_part
        .find("Node-path: tags/V1/\nNode-kind: dir\nNode-action: add\n")
        .expect("tag dir node");
    let file = tag_part.find("Node-path: tags/V1/a\n").expect("tag file node");
    assert!(dir < file);
}

#[test]
fn prop_content_lengths_are_exact() {
    let out = convert(&[("a", false, false, TAGGED)]);
    for chunk in out.split("Revision-number: ").skip(1) {
        let len: usize = chunk
            .lines()
            .find_map(|l| l.strip_prefix("Prop-content-length: "))
            .expect("prop length header")
            .parse()
            .unwrap();
        let body = chunk.find("\n\n").expect("header separator") + 2;
        let props = &chunk.as_bytes()[body..body + len];
        assert!(props.ends_with(b"PROPS-END\n"), "block sized exactly");
    }
}

const SUBDIR_FILE: &[u8] = b"head\t1.1;\n\
    access;\n\
    symbols;\n\
    locks; strict;\n\
    \n\
    1.1\n\
    date\t2020.01.02.03.04.05;\tauthor alice;\tstate Exp;\n\
    branches;\n\
    next\t;\n\
    \n\
    desc\n\
    @@\n\
    \n\
    1.1\n\
    log\n\
    @add@\n\
    text\n\
    @x\n\
    @\n";

#[test]
fn directories_are_added_on_first_file() {
    let out = convert(&[("src/net/sock.c", false, false, SUBDIR_FILE)]);
    let d1 = out
        .find("Node-path: trunk/src/\nNode-kind: dir\nNode-action: add\n")
        .expect("src dir");
    let d2 = out
        .find("Node-path: trunk/src/net/\nNode-kind: dir\nNode-action: add\n")
        .expect("net dir");
    let f = out.find("Node-path: trunk/src/net/sock.c\n").expect("file");
    assert!(d1 < d2 && d2 < f);
}

const DELETED: &[u8] = b"head\t1.2;\n\
    access;\n\
    symbols;\n\
    locks; strict;\n\
    \n\
    1.2\n\
    date\t2020.01.02.00.00.00;\tauthor bob;\tstate dead;\n\
    branches;\n\
    next\t1.1;\n\
    \n\
    1.1\n\
    date\t2020.01.01.00.00.00;\tauthor bob;\tstate Exp;\n\
    branches;\n\
    next\t;\n\
    \n\
    desc\n\
    @@\n\
    \n\
    1.2\n\
    log\n\
    @remove@\n\
    text\n\
    @hi\n\
    @\n\
    \n\
    1.1\n\
    log\n\
    @create@\n\
    text\n\
    @d1 1\n\
    @\n";

#[test]
fn deletion_removes_file_and_empty_directory() {
    let out = convert(&[("d/gone", false, true, DELETED)]);

    let add = out
        .find("Node-path: trunk/d/gone\nNode-kind: file\nNode-action: add\n")
        .expect("file add");
    let del = out
        .find("Node-path: trunk/d/gone\nNode-action: delete\n")
        .expect("file delete");
    assert!(add < del);
    // The directory is dropped once its only entry is gone.
    let dir_del = out
        .find("Node-path: trunk/d/\nNode-kind: dir\nNode-action: delete\n")
        .expect("dir delete");
    assert!(del < dir_del);
}

#[test]
fn executable_files_carry_the_svn_property() {
    let out = convert(&[("run.sh", true, false, SUBDIR_FILE)]);
    assert!(out.contains("Prop-content-length: 36\n"));
    assert!(out.contains("K 14\nsvn:executable\nV 1\n*\nPROPS-END\n"));
    // Content-length counts props plus text.
    assert!(out.contains("Text-content-length: 2\nContent-length: 38\n"));
}

#[test]
fn revision_numbers_are_sequential_across_commits_and_tags() {
    let other: &[u8] = b"head\t1.1;\naccess;\nsymbols;\nlocks;\n\
        1.1\ndate\t2021.06.01.00.00.00;\tauthor z;\tstate Exp;\nbranches;\nnext\t;\n\
        desc\n@@\n\
        1.1\nlog\n@later@\ntext\n@y\n@\n";
    let out = convert(&[("a", false, false, TAGGED), ("b", false, false, other)]);

    // rev 1 dirs, rev 2 first commit, rev 3 its tag, rev 4 second commit.
    for n in 1..=4 {
        assert!(
            out.contains(&format!("Revision-number: {n}\n")),
            "missing revision {n}:\n{out}"
        );
    }
    let r4 = out.find("Revision-number: 4\n").unwrap();
    assert!(out[r4..].contains("later"));
}
