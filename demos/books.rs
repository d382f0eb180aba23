use rowlock::options::{LockOptions, TransactionOptions};
use rowlock::{PessimisticTransactionDB, Record, Repository, Transaction};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ISBN: &str = "9780321751041";

fn main() {
    let _ = env_logger::try_init();
    let db = Arc::new(PessimisticTransactionDB::open());
    db.store().insert(
        ISBN,
        Record::new("Art of Computer Programming, Volume 1: Fundamental Algorithms")
            .with_field("rating", 0),
    );
    let repository = Arc::new(Repository::new(db.clone()));

    // a reader holds the row for share; an update times out with its transaction
    let reader = PessimisticTransactionDB::begin(&db, TransactionOptions::default()).unwrap();
    repository.find_for_share(&reader, ISBN).unwrap();
    let writer = PessimisticTransactionDB::begin(
        &db,
        TransactionOptions::with_timeout(Duration::from_secs(1)),
    )
    .unwrap();
    println!(
        "update under a shared lock: {:?}",
        repository.set_field(&writer, ISBN, "rating", 10, None)
    );
    reader.commit().unwrap();

    // NOWAIT and SKIP LOCKED against a held exclusive lock
    let owner = PessimisticTransactionDB::begin(&db, TransactionOptions::default()).unwrap();
    repository.find_for_update_nowait(&owner, ISBN).unwrap();
    let other = PessimisticTransactionDB::begin(&db, TransactionOptions::default()).unwrap();
    println!(
        "NOWAIT: {:?}",
        repository.find_for_update_nowait(&other, ISBN)
    );
    println!(
        "SKIP LOCKED: {:?}",
        repository.find_for_update_skip_locked(&other, ISBN)
    );

    // a blocked writer proceeds once the owner commits
    let repository_other = repository.clone();
    let handle = thread::spawn(move || {
        repository_other
            .find_for_update(&other, ISBN, &LockOptions::default())
            .unwrap();
        let rows = repository_other
            .set_field(&other, ISBN, "rating", 10, None)
            .unwrap();
        println!("txn {} updated {} row(s)", other.txn_id(), rows);
        other.commit().unwrap();
    });
    thread::sleep(Duration::from_millis(100));
    owner.commit().unwrap();
    handle.join().unwrap();

    println!("{:?}", repository.find_without_lock(ISBN));
}
