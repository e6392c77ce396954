//! Data files through loader, writer and store

use record_store::ingest::read_source;
use record_store::questions::{self, Answer};
use record_store::{
    AddressBookParser, DataFileLoader, FieldValue, ImportReconciler, IngestWriter, StoreConfig,
};
use std::fs;
use std::io::Write;
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;
use tempfile::{NamedTempFile, TempDir};

const ADDRESS_BOOK: &str = "\
Bill McKnight, Male, 16/03/77
Paul Robinson, Male, 15/01/85
Gemma Lane, Female, 20/11/91
Sarah Stone, Female, 20/09/80
Wes Jackson, Male, 14/08/74
";

fn writer() -> IngestWriter {
    IngestWriter::new(ImportReconciler::new(
        StoreConfig::default().build_store().shared(),
    ))
}

#[test]
fn test_load_address_book() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(ADDRESS_BOOK.as_bytes()).unwrap();

    let mut loader = DataFileLoader::new();
    loader.add_data_file(file.path()).unwrap();
    let (mut handle, events) = DataFileLoader::spawn(Arc::new(AddressBookParser::new()));
    loader.load(&handle).unwrap();
    handle.close();

    let mut writer = writer();
    let report = writer.drain(&events).unwrap();
    handle.join().unwrap();

    assert_eq!(report.passes.len(), 1);
    assert_eq!(report.passes[0].inserted, 5);

    let store = writer.reconciler().store().read();
    assert_eq!(store.entry_count(), 5);
    assert_eq!(store.view("byGender", Some("Male")).unwrap().len(), 3);
    assert_eq!(store.view("byGender", Some("Female")).unwrap().len(), 2);

    let bill = store.view("byName", Some("Bill McKnight")).unwrap();
    let bill = bill.records()[0];
    assert_eq!(bill.field("birthday"), Some(&FieldValue::from("1977-03-16")));
}

#[test]
fn test_rewritten_file_sweeps_deleted_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("addressbook.txt");
    fs::write(&path, ADDRESS_BOOK).unwrap();
    let path = fs::canonicalize(&path).unwrap();

    let parser = AddressBookParser::new();
    let mut writer = writer();

    let (tx, rx) = channel();
    read_source(&path, &parser, &tx).unwrap();
    drop(tx);
    writer.drain(&rx).unwrap();
    let revision_after_first = writer.reconciler().store().read().revision();

    // drop Paul, add Tom
    let edited = ADDRESS_BOOK.replace(
        "Paul Robinson, Male, 15/01/85\n",
        "Tom Riddle, Male, 31/12/26\n",
    );
    fs::write(&path, edited).unwrap();

    let (tx, rx) = channel();
    read_source(&path, &parser, &tx).unwrap();
    drop(tx);
    let report = writer.drain(&rx).unwrap();

    let pass = &report.passes[0];
    assert_eq!(pass.pass, 2);
    assert_eq!(pass.inserted, 1);
    assert_eq!(pass.reconfirmed, 4);
    assert_eq!(pass.removed.len(), 1);

    let store = writer.reconciler().store().read();
    assert_eq!(store.entry_count(), 5);
    assert!(store.revision() > revision_after_first);
    assert!(store.view("byName", Some("Paul Robinson")).unwrap().is_empty());
    assert_eq!(store.view("byName", Some("Tom Riddle")).unwrap().len(), 1);
}

#[test]
fn test_readers_see_consistent_store_during_ingest() {
    let mut file = NamedTempFile::new().unwrap();
    for i in 0..200 {
        writeln!(file, "Person {:03}, Male, 01/01/80", i).unwrap();
    }

    let mut loader = DataFileLoader::new();
    loader.add_data_file(file.path()).unwrap();
    let (mut handle, events) = DataFileLoader::spawn(Arc::new(AddressBookParser::new()));
    loader.load(&handle).unwrap();
    handle.close();

    let mut writer = writer();
    let shared = writer.reconciler().store().clone();

    let reader = thread::spawn(move || {
        let mut last_revision = 0;
        for _ in 0..100 {
            let store = shared.read();
            let revision = store.revision();
            assert!(revision >= last_revision);
            last_revision = revision;

            // every live record is in exactly one gender bucket
            let males = store.view("byGender", Some("Male")).unwrap().len();
            assert_eq!(males, store.entry_count());
        }
    });

    writer.drain(&events).unwrap();
    handle.join().unwrap();
    reader.join().unwrap();

    assert_eq!(writer.reconciler().store().read().entry_count(), 200);
}

#[test]
fn test_bundled_address_book_answers() {
    let config =
        StoreConfig::from_yaml(concat!(env!("CARGO_MANIFEST_DIR"), "/store.yaml")).unwrap();

    let mut loader = DataFileLoader::new();
    for path in &config.data_files {
        loader.add_data_file(path).unwrap();
    }
    let (mut handle, events) = DataFileLoader::spawn(Arc::new(AddressBookParser::new()));
    loader.load(&handle).unwrap();
    handle.close();

    let mut writer = IngestWriter::new(ImportReconciler::new(config.build_store().shared()));
    writer.drain(&events).unwrap();
    handle.join().unwrap();

    let store = writer.reconciler().store().read();
    let answers: Vec<Answer> = questions::answer_all(&store)
        .unwrap()
        .into_iter()
        .map(|a| a.answer)
        .collect();
    assert_eq!(
        answers,
        vec![
            Answer::Count(2),
            Answer::Person("Wes Jackson".to_string()),
            Answer::Days(2862),
        ]
    );
}
