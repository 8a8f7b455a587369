use std::cell::RefCell;

use memkit::{Dictionary, DictionaryConfig, HeapAllocator, TextKey};
use memkit_testkit::{
    data_gen::{distinct_keys, distinct_words, employees},
    records::{Employee, Term},
};

#[test]
fn test_delete_scenario() {
    let heap = HeapAllocator::create().unwrap();
    let mut dict = Dictionary::<Employee>::create(&heap).unwrap();
    dict.set(Employee::new(123, "z")).unwrap();
    dict.set(Employee::new(133, "z")).unwrap();
    assert_eq!(dict.len(), 2);
    assert!(dict.delete(&133).unwrap().is_some());
    assert!(dict.get(&133).unwrap().is_none());
    assert_eq!(dict.len(), 1);
    dict.destroy().unwrap();
    assert!(heap.destroy().is_balanced());
}

#[test]
fn test_many_employees() {
    let heap = HeapAllocator::create().unwrap();
    let list = employees(3000, 11);
    let mut dict = Dictionary::<Employee>::create(&heap).unwrap();
    for employee in &list {
        assert!(dict.set(*employee).unwrap().is_none());
    }
    assert_eq!(dict.len(), list.len());
    for employee in &list {
        assert_eq!(dict.get(&employee.id).unwrap(), Some(employee));
        assert_eq!(
            dict.get_by_integer_key(employee.id).unwrap(),
            Some(employee)
        );
    }
    for employee in list.iter().step_by(2) {
        assert_eq!(dict.delete(&employee.id).unwrap(), Some(*employee));
    }
    assert_eq!(dict.len(), list.len() / 2);
    for (i, employee) in list.iter().enumerate() {
        assert_eq!(dict.contains_key(&employee.id).unwrap(), i % 2 == 1);
    }
}

#[test]
fn test_absent_keys() {
    let heap = HeapAllocator::create().unwrap();
    let keys = distinct_keys(400, 5);
    let (present, absent) = keys.split_at(200);
    let mut dict = Dictionary::<Employee>::builder(&heap)
        .config(DictionaryConfig {
            initial_capacity: 512,
            ..DictionaryConfig::with_seed(99)
        })
        .build()
        .unwrap();
    for &id in present {
        dict.set(Employee::new(id, "p")).unwrap();
    }
    assert_eq!(dict.capacity(), 512);
    assert!(absent.iter().all(|id| dict.get(id).unwrap().is_none()));
    assert!(absent.iter().all(|&id| dict.delete(&id).unwrap().is_none()));
    assert_eq!(dict.len(), 200);
}

#[test]
fn test_terms() {
    let heap = HeapAllocator::create().unwrap();
    let words = distinct_words(500, 20, 8);
    let mut dict = Dictionary::<Term>::create(&heap).unwrap();
    for (i, word) in words.iter().enumerate() {
        dict.set(Term::new(word, i as u64)).unwrap();
    }
    for (i, word) in words.iter().enumerate() {
        let key = TextKey::new(word).unwrap();
        assert_eq!(dict.get(&key).unwrap().map(|t| t.hits), Some(i as u64));
    }
    let missing = TextKey::new("0-not-a-word").unwrap();
    assert!(dict.get(&missing).unwrap().is_none());
}

#[test]
fn test_export_round_trip() {
    let heap = HeapAllocator::create().unwrap();
    let mut dict = Dictionary::<Employee>::create(&heap).unwrap();
    for employee in employees(100, 3) {
        dict.set(employee).unwrap();
    }
    let array = dict.export_to_array(&heap).unwrap();
    assert_eq!(array.len(), dict.len());
    for record in &array {
        let stored = dict.get(&record.id).unwrap().unwrap();
        assert_eq!(stored, record);
        assert!(!std::ptr::eq(stored, record));
    }
    drop(array);
    drop(dict);
    assert!(heap.destroy().is_balanced());
}

#[test]
fn test_finalizer_collects_remaining_records() {
    let finalized = RefCell::new(Vec::new());
    let heap = HeapAllocator::create().unwrap();
    let mut dict = Dictionary::<Employee>::builder(&heap)
        .finalizer(|e: &mut Employee| finalized.borrow_mut().push(e.id))
        .build()
        .unwrap();
    for id in 1..=5 {
        dict.set(Employee::new(id, "f")).unwrap();
    }
    dict.delete(&3).unwrap();
    dict.destroy().unwrap();
    let mut ids = finalized.into_inner();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 4, 5]);
}

#[test]
fn test_detached_iteration_faults_on_mutation() {
    let heap = HeapAllocator::create().unwrap();
    let mut dict = Dictionary::<Employee>::create(&heap).unwrap();
    for id in 0..8 {
        dict.set(Employee::new(id, "i")).unwrap();
    }
    let mut cursor = dict.cursor().unwrap();
    let mut visited = 0;
    while let Some(record) = dict.next_entry(&mut cursor).unwrap() {
        visited += 1;
        if record.id == 7 {
            break;
        }
    }
    assert!(visited > 0);
    dict.delete(&0).unwrap();
    let err = dict.next_entry(&mut cursor).unwrap_err();
    assert!(err.is_integrity());
}
