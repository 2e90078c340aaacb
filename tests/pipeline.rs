use note_importer::error::ImportError;
use note_importer::models::{ImportCursor, ScopeFilter, Visibility};
use note_importer::pipeline::{
    DONE_LABEL, ImportContext, PipelineDriver, PipelineState, ProgressEvent,
};
use note_importer::test_support::{MemoryIndex, MemoryNoteStore, RecordingProgress, sample_note};
use std::collections::BTreeSet;

const NOTE_A: &str = "9a00000aaa";
const NOTE_B: &str = "9a00000bbb";
const NOTE_C: &str = "9a00000ccc";

fn three_local_notes() -> MemoryNoteStore {
    MemoryNoteStore::new(vec![
        sample_note(NOTE_A, None),
        sample_note(NOTE_C, None),
        sample_note(NOTE_B, None),
    ])
}

fn context(
    store: MemoryNoteStore,
    index: MemoryIndex,
    scope: ScopeFilter,
    start: ImportCursor,
    batch_size: usize,
) -> ImportContext<MemoryNoteStore, MemoryIndex> {
    ImportContext::new(store, index, scope, start, batch_size)
}

#[tokio::test]
async fn imports_newest_first_in_cursor_sized_batches() {
    let ctx = context(
        three_local_notes(),
        MemoryIndex::new(),
        ScopeFilter::LocalOnly,
        ImportCursor::Start,
        2,
    );
    let mut progress = RecordingProgress::default();

    let summary = PipelineDriver::new(&ctx)
        .run(&mut progress)
        .await
        .expect("import succeeds");

    assert_eq!(summary.imported, 3);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.batches, 2);

    assert_eq!(
        ctx.sink.writes(),
        vec![
            vec![NOTE_C.to_string(), NOTE_B.to_string()],
            vec![NOTE_A.to_string()],
        ]
    );
    assert_eq!(
        ctx.source.batch_calls(),
        vec![
            ImportCursor::Start,
            ImportCursor::Before(NOTE_B.to_string()),
            ImportCursor::Before(NOTE_A.to_string()),
        ]
    );
    assert_eq!(progress.cursor_labels(), vec!["(all)", NOTE_B, NOTE_A, DONE_LABEL]);
}

#[tokio::test]
async fn each_qualifying_note_is_written_exactly_once() {
    let mut notes = Vec::new();
    for n in 0..23u32 {
        let id = format!("9a{:08}", n);
        let host = if n % 3 == 0 { Some("remote.example") } else { None };
        let mut note = sample_note(&id, host);
        if n % 5 == 0 {
            note.visibility = Visibility::Other("followers".into());
        }
        if n % 7 == 0 {
            note.text = None;
        }
        notes.push(note);
    }
    let store = MemoryNoteStore::new(notes);
    let expected = store.descending_scan(&ScopeFilter::All);

    let ctx = context(store, MemoryIndex::new(), ScopeFilter::All, ImportCursor::Start, 4);
    PipelineDriver::new(&ctx)
        .run(&mut RecordingProgress::default())
        .await
        .expect("import succeeds");

    let written: Vec<String> = ctx.sink.writes().into_iter().flatten().collect();
    assert_eq!(written, expected);

    let unique: BTreeSet<&String> = written.iter().collect();
    assert_eq!(unique.len(), written.len());
    assert!(written.iter().all(|id| {
        let n: u32 = id[2..].parse().unwrap();
        n % 5 != 0 && n % 7 != 0
    }));
}

#[tokio::test]
async fn local_scope_skips_remote_notes() {
    let store = MemoryNoteStore::new(vec![
        sample_note(NOTE_A, None),
        sample_note(NOTE_B, Some("remote.example")),
        sample_note(NOTE_C, None),
    ]);
    let ctx = context(store, MemoryIndex::new(), ScopeFilter::LocalOnly, ImportCursor::Start, 10);

    let summary = PipelineDriver::new(&ctx)
        .run(&mut RecordingProgress::default())
        .await
        .unwrap();

    assert_eq!(summary.imported, 2);
    let ids: Vec<String> = ctx.sink.documents().into_keys().collect();
    assert_eq!(ids, vec![NOTE_A.to_string(), NOTE_C.to_string()]);
}

#[tokio::test]
async fn host_allowlist_keeps_only_listed_hosts() {
    let store = MemoryNoteStore::new(vec![
        sample_note(NOTE_A, Some("a.example")),
        sample_note(NOTE_B, Some("b.example")),
        sample_note(NOTE_C, None),
    ]);
    let scope = ScopeFilter::HostAllowlist(["a.example".to_string()].into_iter().collect());
    let ctx = context(store, MemoryIndex::new(), scope, ImportCursor::Start, 10);

    PipelineDriver::new(&ctx)
        .run(&mut RecordingProgress::default())
        .await
        .unwrap();

    let ids: Vec<String> = ctx.sink.documents().into_keys().collect();
    assert_eq!(ids, vec![NOTE_A.to_string()]);
}

#[tokio::test]
async fn documents_carry_the_decoded_creation_time() {
    let mut note = sample_note(NOTE_C, Some("remote.example"));
    note.cw = Some("spoiler".into());
    note.tags = vec!["misskey".into()];
    note.channel_id = Some("9a0000chan".into());
    let ctx = context(
        MemoryNoteStore::new(vec![note]),
        MemoryIndex::new(),
        ScopeFilter::All,
        ImportCursor::Start,
        10,
    );

    PipelineDriver::new(&ctx)
        .run(&mut RecordingProgress::default())
        .await
        .unwrap();

    let doc = ctx.sink.document(NOTE_C).expect("document indexed");
    assert_eq!(doc.created_at, note_importer::aid::decode(NOTE_C).unwrap());
    assert_eq!(doc.user_host.as_deref(), Some("remote.example"));
    assert_eq!(doc.cw.as_deref(), Some("spoiler"));
    assert_eq!(doc.tags, vec!["misskey".to_string()]);
    assert_eq!(doc.channel_id.as_deref(), Some("9a0000chan"));
}

#[tokio::test]
async fn rerunning_an_import_leaves_the_index_unchanged() {
    let index = MemoryIndex::new();
    let first = context(three_local_notes(), index, ScopeFilter::All, ImportCursor::Start, 2);
    PipelineDriver::new(&first)
        .run(&mut RecordingProgress::default())
        .await
        .unwrap();
    let before = first.sink.documents();

    let second = context(
        three_local_notes(),
        first.sink,
        ScopeFilter::All,
        ImportCursor::Start,
        2,
    );
    PipelineDriver::new(&second)
        .run(&mut RecordingProgress::default())
        .await
        .unwrap();

    assert_eq!(second.sink.documents(), before);
    assert_eq!(second.sink.writes().len(), 4);
}

#[tokio::test]
async fn failed_write_keeps_the_last_committed_cursor() {
    let ctx = context(
        three_local_notes(),
        MemoryIndex::new().failing_on_write(1),
        ScopeFilter::All,
        ImportCursor::Start,
        2,
    );
    let mut progress = RecordingProgress::default();
    let mut driver = PipelineDriver::new(&ctx);

    let err = loop {
        match driver.step(&mut progress).await {
            Ok(state) => assert!(!state.is_terminal(), "run should not finish"),
            Err(err) => break err,
        }
    };

    assert!(matches!(err, ImportError::IndexWrite(_)));
    assert_eq!(driver.state(), PipelineState::Failed);
    assert_eq!(driver.cursor(), &ImportCursor::Before(NOTE_B.to_string()));
    assert_eq!(driver.imported(), 2);
    assert!(ctx.sink.document(NOTE_A).is_none());
    assert!(
        !progress
            .events
            .iter()
            .any(|event| matches!(event, ProgressEvent::Finished { .. }))
    );
}

#[tokio::test]
async fn resuming_from_a_failed_run_completes_the_import() {
    let ctx = context(
        three_local_notes(),
        MemoryIndex::new(),
        ScopeFilter::All,
        ImportCursor::Before(NOTE_B.to_string()),
        2,
    );
    let mut progress = RecordingProgress::default();

    let summary = PipelineDriver::new(&ctx).run(&mut progress).await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(ctx.sink.writes(), vec![vec![NOTE_A.to_string()]]);
    assert_eq!(progress.cursor_labels(), vec![NOTE_B, NOTE_A, DONE_LABEL]);
}

#[tokio::test]
async fn malformed_identifier_fails_before_writing_the_batch() {
    let store = MemoryNoteStore::new(vec![sample_note("zzzz", None), sample_note("zzz", None)]);
    let ctx = context(store, MemoryIndex::new(), ScopeFilter::All, ImportCursor::Start, 10);
    let mut driver = PipelineDriver::new(&ctx);
    let mut progress = RecordingProgress::default();

    let err = loop {
        if let Err(err) = driver.step(&mut progress).await {
            break err;
        }
    };

    assert!(matches!(err, ImportError::MalformedIdentifier(_)));
    assert_eq!(driver.state(), PipelineState::Failed);
    assert_eq!(driver.cursor(), &ImportCursor::Start);
    assert!(ctx.sink.writes().is_empty());
}

#[tokio::test]
async fn count_failure_ends_the_run() {
    let ctx = context(
        three_local_notes().failing_count(),
        MemoryIndex::new(),
        ScopeFilter::All,
        ImportCursor::Start,
        2,
    );
    let mut driver = PipelineDriver::new(&ctx);
    let mut progress = RecordingProgress::default();

    assert_eq!(driver.step(&mut progress).await.unwrap(), PipelineState::Counting);
    let err = driver.step(&mut progress).await.unwrap_err();

    assert!(matches!(err, ImportError::Store(_)));
    assert_eq!(driver.state(), PipelineState::Failed);
    assert!(progress.events.is_empty());
    assert!(ctx.source.batch_calls().is_empty());
}

#[tokio::test]
async fn store_failure_mid_scan_reports_the_resume_point() {
    let ctx = context(
        three_local_notes().failing_on_batch(1),
        MemoryIndex::new(),
        ScopeFilter::All,
        ImportCursor::Start,
        2,
    );
    let mut driver = PipelineDriver::new(&ctx);
    let mut progress = RecordingProgress::default();

    let err = loop {
        if let Err(err) = driver.step(&mut progress).await {
            break err;
        }
    };

    assert!(matches!(err, ImportError::Store(_)));
    assert_eq!(driver.cursor().as_id(), Some(NOTE_B));
    assert_eq!(ctx.sink.writes().len(), 1);
}

#[tokio::test]
async fn step_walks_through_every_state() {
    let ctx = context(
        MemoryNoteStore::new(vec![sample_note(NOTE_A, None)]),
        MemoryIndex::new(),
        ScopeFilter::All,
        ImportCursor::Start,
        5,
    );
    let mut driver = PipelineDriver::new(&ctx);
    let mut progress = RecordingProgress::default();

    assert_eq!(driver.state(), PipelineState::Init);
    let mut states = Vec::new();
    while !driver.state().is_terminal() {
        states.push(driver.step(&mut progress).await.unwrap());
    }

    assert_eq!(
        states,
        vec![
            PipelineState::Counting,
            PipelineState::Importing,
            PipelineState::Importing,
            PipelineState::Done,
        ]
    );
    assert_eq!(driver.step(&mut progress).await.unwrap(), PipelineState::Done);
    assert_eq!(driver.summary().batches, 1);
}

#[tokio::test]
async fn empty_table_finishes_without_writes() {
    let ctx = context(
        MemoryNoteStore::new(Vec::new()),
        MemoryIndex::new(),
        ScopeFilter::LocalOnly,
        ImportCursor::Start,
        2,
    );
    let mut progress = RecordingProgress::default();

    let summary = PipelineDriver::new(&ctx).run(&mut progress).await.unwrap();

    assert_eq!(summary.imported, 0);
    assert!(ctx.sink.writes().is_empty());
    assert_eq!(progress.cursor_labels(), vec!["(all)", DONE_LABEL]);
}
