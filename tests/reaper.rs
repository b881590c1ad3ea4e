use mirador::{ChangeDescriptor, Job, ParkedSet, Reaper};

fn failed_job(id: &str, seq: i64, retry: u32) -> Job {
    let mut job = Job::live(ChangeDescriptor::new(id, seq).with_rev("r"));
    job.retry = retry;
    job
}

#[test]
fn parked_set_keeps_one_entry_per_package() {
    let mut parked = ParkedSet::new();
    assert!(parked.insert(failed_job("a", 10, 3)).is_none());
    let replaced = parked
        .insert(failed_job("a", 12, 3))
        .expect("stale entry replaced");
    assert_eq!(replaced.seq(), 10);
    assert_eq!(parked.len(), 1);
    assert!(parked.contains("a"));
}

#[test]
fn remove_erases_superseded_entries() {
    let mut parked = ParkedSet::new();
    parked.insert(failed_job("a", 10, 3));
    assert!(parked.remove("a").is_some());
    assert!(parked.remove("a").is_none());
    assert!(parked.is_empty());
}

#[test]
fn drain_orders_jobs_by_sequence_then_id() {
    let mut parked = ParkedSet::new();
    parked.insert(failed_job("late", 30, 1));
    parked.insert(failed_job("early", 10, 1));
    parked.insert(failed_job("mid", 20, 1));
    let drained = parked.drain();
    let ids: Vec<&str> = drained.iter().map(Job::package_id).collect();
    assert_eq!(ids, vec!["early", "mid", "late"]);
    assert!(parked.is_empty());
}

#[test]
fn reaped_jobs_reset_retry_and_never_checkpoint() {
    let reaped = Job::reaped(failed_job("a", 10, 4));
    assert_eq!(reaped.retry, 0);
    assert!(reaped.ignore_seq);
    assert_eq!(reaped.seq(), 10);
}

#[test]
fn reaper_fires_once_per_period() {
    let mut parked = ParkedSet::new();
    let mut reaper = Reaper::new(1_000);
    parked.insert(failed_job("a", 10, 3));

    assert!(reaper.poll(0, &mut parked).is_empty(), "first poll arms");
    assert!(reaper.poll(500, &mut parked).is_empty());
    let reaped = reaper.poll(1_000, &mut parked);
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].package_id(), "a");
    assert_eq!(reaped[0].retry, 0);
    assert!(reaped[0].ignore_seq);
    assert!(parked.is_empty());

    parked.insert(failed_job("b", 11, 3));
    assert!(
        reaper.poll(1_500, &mut parked).is_empty(),
        "next window has not elapsed"
    );
    assert_eq!(reaper.poll(2_000, &mut parked).len(), 1);
}
