//! End-to-end tests for the transformation engine.
//!
//! These tests drive whole archives through [`Transformer`] and check both
//! the rewritten archive and the returned [`ChangeRecord`].

mod common;

use std::io::{Read, Write};

use common::*;
use rezip::checksum::Crc32;
use rezip::{
    Action, ActionSet, BufferedAction, ChangeRecord, CompressionMethod, ContainerPosition, Error,
    SelectionRule, TransformContext, TransformOptions, TransformOutcome, Transformer, ZipEntry,
    ZipWriter,
};

fn run(registry: &ActionSet, input: &[u8]) -> (ChangeRecord, Vec<u8>) {
    let mut output = Vec::new();
    let record = Transformer::new(registry)
        .process("input.zip", input, &mut output)
        .unwrap();
    (record, output)
}

#[test]
fn test_class_entry_relocated_and_text_copied() {
    let input = create_archive(&[
        ("lib/Foo.class", b"\xca\xfe\xba\xbe\x00\x00\x00\x34"),
        ("README.txt", b"hello"),
    ]);
    let registry = ActionSet::new().with(
        BufferedAction::identity("classes")
            .with_extensions(["class"])
            .rename_prefix("lib/", "lib2/"),
    );

    let (record, output) = run(&registry, &input);

    assert_eq!(entry_names(&output), vec!["lib2/Foo.class", "README.txt"]);
    assert_eq!(
        record.outcomes(),
        vec![
            TransformOutcome::TransformedBuffered,
            TransformOutcome::CopiedUnaccepted
        ]
    );
    assert_eq!(record.output_name_of("lib/Foo.class"), Some("lib2/Foo.class"));
    assert_eq!(
        record.renames().collect::<Vec<_>>(),
        vec![("lib/Foo.class", "lib2/Foo.class")]
    );
    assert_eq!(
        entry_data(&output, "lib2/Foo.class").unwrap(),
        b"\xca\xfe\xba\xbe\x00\x00\x00\x34"
    );
    assert_eq!(entry_data(&output, "README.txt").unwrap(), b"hello");
}

#[test]
fn test_unmatched_archive_round_trips() {
    let mut writer = ZipWriter::new(Vec::new());
    writer
        .start_entry(&stored_entry("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"))
        .unwrap();
    writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
    writer.start_entry(&ZipEntry::new("docs/")).unwrap();
    writer.start_entry(&ZipEntry::new("docs/guide.md")).unwrap();
    writer.write_all(&b"# Guide\n".repeat(500)).unwrap();
    let input = writer.finish().unwrap();

    let (record, output) = run(&ActionSet::new(), &input);
    assert_eq!(record.unaccepted(), 3);

    let before = read_entries(&input);
    let after = read_entries(&output);
    assert_eq!(before.len(), after.len());
    for ((a, a_data), (b, b_data)) in before.iter().zip(&after) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.method, b.method);
        assert_eq!(a.modified, b.modified);
        assert_eq!(a_data, b_data);
    }
}

#[test]
fn test_stored_entry_gets_crc_and_size_of_new_content() {
    let original = b"short";
    let input = create_stored_archive(&[("data/a.txt", original)]);
    let registry = ActionSet::new().with(BufferedAction::new("grow", |_, data| {
        let mut grown = data.to_vec();
        grown.extend_from_slice(b" and then some");
        Ok(grown)
    }));

    let (record, output) = run(&registry, &input);
    assert_eq!(record.count(TransformOutcome::TransformedBuffered), 1);

    let entries = read_entries(&output);
    let (entry, data) = &entries[0];
    assert_eq!(data, b"short and then some");
    assert_eq!(entry.method, CompressionMethod::Stored);
    assert_eq!(entry.size, Some(data.len() as u64));
    assert_eq!(entry.crc32, Some(Crc32::compute(data)));
    assert_ne!(entry.crc32, Some(Crc32::compute(original)));
    assert_eq!(entry.modified, stored_entry("x", b"").modified);
}

#[test]
fn test_transform_error_falls_back_to_original_bytes() {
    let input = create_archive(&[
        ("a.txt", b"first"),
        ("poison.txt", b"keep me"),
        ("z.txt", b"last"),
    ]);
    let registry = ActionSet::new().with(PoisonAction);

    let (record, output) = run(&registry, &input);

    assert_eq!(
        record.outcomes(),
        vec![
            TransformOutcome::TransformedBuffered,
            TransformOutcome::TransformedWithFallback,
            TransformOutcome::TransformedBuffered,
        ]
    );
    assert_eq!(record.failed(), 0);
    assert_eq!(entry_data(&output, "a.txt").unwrap(), b"FIRST");
    assert_eq!(entry_data(&output, "poison.txt").unwrap(), b"keep me");
    assert_eq!(entry_data(&output, "z.txt").unwrap(), b"LAST");
}

#[test]
fn test_other_action_errors_drop_the_entry() {
    let input = create_archive(&[("blob.bin", b"\x00\x01"), ("after.txt", b"ok")]);
    let registry = ActionSet::new().with(BrokenAction);

    let (record, output) = run(&registry, &input);

    assert_eq!(record.failed(), 1);
    assert_eq!(record.entry("blob.bin").unwrap().output, None);
    assert_eq!(entry_names(&output), vec!["after.txt"]);
}

#[test]
fn test_identity_transform_is_idempotent() {
    let input = create_archive(&[("a.txt", b"alpha"), ("b/c.xml", b"<c/>"), ("d", b"")]);
    let registry = ActionSet::new().with(BufferedAction::identity("all"));

    let (first, once) = run(&registry, &input);
    let (second, twice) = run(&registry, &once);

    for record in [&first, &second] {
        assert_eq!(record.total(), 3);
        assert_eq!(record.count(TransformOutcome::TransformedBuffered), 3);
        assert_eq!(record.failed(), 0);
    }
    assert_eq!(first.outcomes(), second.outcomes());
    assert_eq!(read_entries(&once), read_entries(&twice));
}

#[test]
fn test_traversal_names_are_dropped() {
    let input = create_archive(&[
        ("../../etc/passwd", b"root:x:0:0"),
        ("ok/./file.txt", b"fine"),
        ("a/b/../../../escape", b"nope"),
        ("/abs/path.txt", b"abs"),
    ]);

    let (record, output) = run(&ActionSet::new(), &input);

    assert_eq!(record.failed(), 2);
    assert_eq!(
        record.entry("../../etc/passwd").unwrap().outcome,
        TransformOutcome::Failed
    );
    assert_eq!(entry_names(&output), vec!["ok/file.txt", "abs/path.txt"]);
}

#[test]
fn test_buffered_output_name_escaping_root_fails_entry() {
    let input = create_archive(&[("secret/x.cfg", b"x=1"), ("keep.cfg", b"k=2")]);
    let registry = ActionSet::new().with(
        BufferedAction::identity("relocate")
            .with_extensions(["cfg"])
            .with_relocation(|name| {
                if name.starts_with("secret/") {
                    format!("a/../../{}", name)
                } else {
                    format!("conf/{}", name)
                }
            }),
    );

    let (record, output) = run(&registry, &input);

    let failed = record.entry("secret/x.cfg").unwrap();
    assert_eq!(failed.outcome, TransformOutcome::Failed);
    assert_eq!(failed.output, None);
    assert_eq!(record.output_name_of("keep.cfg"), Some("conf/keep.cfg"));
    assert_eq!(entry_names(&output), vec!["conf/keep.cfg"]);
    assert_eq!(read_local_entries(&output).len(), 1);
}

/// Streaming pass-through that moves `evil*` entries above the root.
struct EscapingStreamAction;

impl Action for EscapingStreamAction {
    fn name(&self) -> &str {
        "escaping"
    }

    fn accepts(&self, name: &str) -> bool {
        name.ends_with(".dat")
    }

    fn uses_streams(&self) -> bool {
        true
    }

    fn relocate(&self, name: &str) -> String {
        if name.starts_with("evil") {
            "../../evil".to_string()
        } else {
            format!("data/{}", name)
        }
    }

    fn transform_stream(
        &self,
        _ctx: &TransformContext<'_>,
        _name: &str,
        input: &mut dyn Read,
        _declared_len: Option<u64>,
        output: &mut dyn Write,
    ) -> rezip::Result<Option<ChangeRecord>> {
        std::io::copy(input, output).map_err(Error::from_io)?;
        Ok(None)
    }
}

#[test]
fn test_streaming_output_name_escaping_root_fails_entry() {
    let input = create_archive(&[("evil.dat", b"payload"), ("good.dat", b"fine")]);
    let registry = ActionSet::new().with(EscapingStreamAction);

    let (record, output) = run(&registry, &input);

    let failed = record.entry("evil.dat").unwrap();
    assert_eq!(failed.outcome, TransformOutcome::Failed);
    assert_eq!(failed.output, None);
    assert_eq!(
        record.entry("good.dat").unwrap().outcome,
        TransformOutcome::TransformedStreaming
    );
    assert_eq!(entry_names(&output), vec!["data/good.dat"]);
    // Nothing was written for the rejected name.
    assert_eq!(read_local_entries(&output).len(), 1);
    assert_eq!(entry_data(&output, "data/good.dat").unwrap(), b"fine");
}

#[test]
fn test_unselected_entries_copied_verbatim() {
    let input = create_archive(&[("keep/a.txt", b"a"), ("skip/b.txt", b"b")]);
    let registry = ActionSet::new().with(
        BufferedAction::new("upper", |_, data| Ok(data.to_ascii_uppercase()))
            .with_extensions(["txt"])
            .with_selection(SelectionRule::new().exclude("skip/*").unwrap()),
    );

    let (record, output) = run(&registry, &input);

    assert_eq!(record.accepted(), 2);
    assert_eq!(record.selected(), 1);
    assert_eq!(record.unselected(), 1);
    assert_eq!(entry_data(&output, "keep/a.txt").unwrap(), b"A");
    assert_eq!(entry_data(&output, "skip/b.txt").unwrap(), b"b");
}

#[test]
fn test_streaming_action_rewrites_and_renames() {
    let input = create_archive(&[("x.rev", b"abc"), ("y.txt", b"y")]);
    let registry = ActionSet::new().with(ReverseStreamAction);

    let (record, output) = run(&registry, &input);

    assert_eq!(
        record.entry("x.rev").unwrap().outcome,
        TransformOutcome::TransformedStreaming
    );
    assert_eq!(record.output_name_of("x.rev"), Some("x.rev.out"));
    assert_eq!(entry_data(&output, "x.rev.out").unwrap(), b"cba");
}

#[test]
fn test_failed_streaming_entry_left_out() {
    let input = create_archive(&[("fail.rev", b"0123456789"), ("next.rev", b"xy")]);
    let registry = ActionSet::new().with(ReverseStreamAction);

    let (record, output) = run(&registry, &input);

    assert_eq!(record.failed(), 1);
    assert_eq!(record.transformed(), 1);
    assert_eq!(entry_names(&output), vec!["next.rev.out"]);
    // The aborted entry is still framed, so streaming readers step over it.
    let local: Vec<_> = read_local_entries(&output)
        .into_iter()
        .map(|(entry, _)| entry.name)
        .collect();
    assert_eq!(local, vec!["fail.rev.out", "next.rev.out"]);
    assert_eq!(entry_data(&output, "next.rev.out").unwrap(), b"yx");
}

#[test]
fn test_duplicate_output_names_fail_the_later_entry() {
    let input = create_archive(&[("a/x.txt", b"1"), ("b/x.txt", b"2")]);
    let registry = ActionSet::new().with(BufferedAction::identity("flatten").with_relocation(
        |name| match name.rsplit_once('/') {
            Some((_, file)) => file.to_string(),
            None => name.to_string(),
        },
    ));

    let (record, output) = run(&registry, &input);

    assert_eq!(record.transformed(), 1);
    assert_eq!(record.failed(), 1);
    assert_eq!(entry_names(&output), vec!["x.txt"]);
    assert_eq!(entry_data(&output, "x.txt").unwrap(), b"1");
}

#[test]
fn test_undecodable_entries_copied_raw() {
    let payload = b"\x11\x22\x33\x44\x55";
    let mut entry = ZipEntry::new("packed.dat").with_method(CompressionMethod::Other(14));
    entry.size = Some(64);
    entry.compressed_size = Some(payload.len() as u64);
    entry.crc32 = Some(0xdead_beef);
    let mut writer = ZipWriter::new(Vec::new());
    writer.start_raw_entry(&entry).unwrap();
    writer.write_all(payload).unwrap();
    let input = writer.finish().unwrap();

    let registry = ActionSet::new().with(BufferedAction::identity("all"));
    let (record, output) = run(&registry, &input);

    assert_eq!(record.unaccepted(), 1);
    let copied = read_entries(&output);
    let (copy, data) = &copied[0];
    assert_eq!(copy.method, CompressionMethod::Other(14));
    assert_eq!(copy.size, Some(64));
    assert_eq!(copy.crc32, Some(0xdead_beef));
    assert_eq!(data, payload);
}

#[test]
fn test_input_failure_reports_position() {
    let input = create_archive(&[("one.txt", b"1111"), ("two.txt", &[b'2'; 4096])]);
    // Enough for the first entry, not for the second.
    let cut = input.len() / 2;
    let registry = ActionSet::new();
    let mut output = Vec::new();

    let err = Transformer::new(&registry)
        .process("cut.zip", FailingReader::new(&input, cut), &mut output)
        .unwrap_err();

    match err {
        Error::Container {
            input, position, ..
        } => {
            assert_eq!(input, "cut.zip");
            assert!(matches!(
                position,
                ContainerPosition::After(ref name) | ContainerPosition::Processing(ref name)
                    if name == "one.txt" || name == "two.txt"
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_output_failure_is_fatal() {
    let input = create_archive(&[("one.txt", b"1"), ("two.txt", b"2")]);
    let registry = ActionSet::new();

    let err = Transformer::new(&registry)
        .process("full.zip", &input[..], FailingWriter::new(10))
        .unwrap_err();

    match err {
        Error::Container {
            position, source, ..
        } => {
            assert_eq!(position, ContainerPosition::Processing("one.txt".into()));
            assert!(matches!(*source, Error::Io(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_archive_comment_preserved_by_default() {
    let mut writer = ZipWriter::new(Vec::new());
    writer.start_entry(&ZipEntry::new("a.txt")).unwrap();
    writer.write_all(b"a").unwrap();
    writer.set_comment("built by ci");
    let input = writer.finish().unwrap();

    let registry = ActionSet::new();
    let (_, output) = run(&registry, &input);
    let mut reader = rezip::ZipReader::new(&output[..]);
    while reader.next_entry().unwrap().is_some() {}
    assert_eq!(reader.archive_comment(), Some("built by ci"));

    let options = TransformOptions::new().preserve_archive_comment(false);
    let (_, plain) = Transformer::with_options(&registry, options)
        .process_archive("c.zip", rezip::ZipReader::new(&input[..]), Vec::new())
        .unwrap();
    let mut reader = rezip::ZipReader::new(&plain[..]);
    while reader.next_entry().unwrap().is_some() {}
    assert_eq!(reader.archive_comment(), None);
}

#[test]
fn test_options_reach_the_writer() {
    let data = vec![b'z'; 64 * 1024];
    let input = create_archive(&[("z.txt", data.as_slice())]);
    let registry = ActionSet::new().with(BufferedAction::identity("all"));

    let fast = TransformOptions::new().compression_level(0).unwrap();
    let (_, stored_like) = Transformer::with_options(&registry, fast)
        .process_archive("z.zip", rezip::ZipReader::new(&input[..]), Vec::new())
        .unwrap();
    let (_, compressed) = run(&registry, &input);

    assert!(stored_like.len() > compressed.len());
    assert_eq!(entry_data(&stored_like, "z.txt").unwrap(), data);
}
