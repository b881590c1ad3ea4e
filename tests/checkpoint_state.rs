use std::cell::RefCell;
use std::rc::Rc;

use mirador::{
    Checkpointer, FileStateStore, PipelineState, SeqAdvance, StateError, StatePatch, StateStore,
    STAGE_WATCH,
};

#[derive(Clone, Default)]
struct RecordingStore {
    state: Rc<RefCell<PipelineState>>,
    saves: Rc<RefCell<Vec<StatePatch>>>,
}

impl RecordingStore {
    fn saves(&self) -> Rc<RefCell<Vec<StatePatch>>> {
        self.saves.clone()
    }
}

impl StateStore for RecordingStore {
    fn load(&mut self) -> Result<PipelineState, StateError> {
        Ok(self.state.borrow().clone())
    }

    fn save(&mut self, patch: &StatePatch) -> Result<(), StateError> {
        self.saves.borrow_mut().push(patch.clone());
        let mut state = self.state.borrow_mut();
        if let Some(stage) = &patch.stage {
            state.stage = stage.clone();
        }
        if let Some(seq) = patch.seq {
            state.seq = seq;
        }
        Ok(())
    }
}

#[test]
fn sequence_advances_monotonically() {
    let store = RecordingStore::default();
    let saves = store.saves();
    let mut checkpointer = Checkpointer::open(store).expect("open succeeds");
    assert_eq!(checkpointer.seq(), 0);
    assert_eq!(
        checkpointer.save_seq(5).expect("save succeeds"),
        SeqAdvance::Advanced
    );
    assert_eq!(
        checkpointer.save_seq(3).expect("save succeeds"),
        SeqAdvance::Ignored
    );
    assert_eq!(
        checkpointer.save_seq(5).expect("save succeeds"),
        SeqAdvance::Ignored
    );
    assert_eq!(
        checkpointer.save_seq(9).expect("save succeeds"),
        SeqAdvance::Advanced
    );
    assert_eq!(checkpointer.seq(), 9);
    let saved_seqs: Vec<i64> = saves.borrow().iter().filter_map(|patch| patch.seq).collect();
    assert_eq!(saved_seqs, vec![5, 9], "ignored writes never reach the store");
}

#[test]
fn negative_sentinel_sequences_are_ignored() {
    let store = RecordingStore::default();
    let mut checkpointer = Checkpointer::open(store).expect("open succeeds");
    checkpointer.save_seq(10).expect("save succeeds");
    assert_eq!(
        checkpointer.save_seq(-1).expect("save succeeds"),
        SeqAdvance::Ignored
    );
    assert_eq!(checkpointer.seq(), 10);
}

#[test]
fn stage_writes_persist_without_touching_seq() {
    let store = RecordingStore::default();
    let saves = store.saves();
    let mut checkpointer = Checkpointer::open(store).expect("open succeeds");
    checkpointer.save_seq(7).expect("seq saved");
    checkpointer.save_stage(STAGE_WATCH).expect("stage saved");
    assert_eq!(checkpointer.state().stage, STAGE_WATCH);
    assert_eq!(checkpointer.seq(), 7);
    let stage_patch = saves
        .borrow()
        .iter()
        .find(|patch| patch.stage.is_some())
        .cloned()
        .expect("stage patch recorded");
    assert_eq!(stage_patch.seq, None);
}

#[test]
fn file_store_round_trips_partial_saves() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let mut store = FileStateStore::new(&path);
    assert_eq!(
        store.load().expect("missing file reads as default"),
        PipelineState::default()
    );

    store.save(&StatePatch::seq(21)).expect("seq saved");
    store
        .save(&StatePatch::stage(STAGE_WATCH))
        .expect("stage saved");
    let state = store.load().expect("reload succeeds");
    assert_eq!(state.seq, 21, "stage write kept the stored seq");
    assert_eq!(state.stage, STAGE_WATCH);

    let mut reopened = FileStateStore::new(&path);
    assert_eq!(reopened.load().expect("fresh handle reads file"), state);
}

#[test]
fn file_store_surfaces_parse_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"not json").expect("write corrupt state");
    let mut store = FileStateStore::new(&path);
    match store.load() {
        Err(StateError::Parse { .. }) => {}
        other => panic!("expected parse error, got {other:?}"),
    }
}
