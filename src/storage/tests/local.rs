use crate::storage::{LocalLru, Storage};

#[test]
fn clones_share_the_same_store() {
    let lru = LocalLru::new(64);
    let other = lru.clone();
    assert!(lru.put(b"k", b"v"));
    assert_eq!(other.get(b"k"), Some(b"v".to_vec()));
    assert!(other.delete(b"k"));
    assert_eq!(lru.get(b"k"), None);
}

#[test]
fn implements_the_full_storage_contract() {
    let lru = LocalLru::new(16);
    assert!(lru.put_if_absent(b"k", b"v"));
    assert!(!lru.put_if_absent(b"k", b"w"));
    assert!(lru.append(b"k", b"1"));
    assert!(lru.prepend(b"k", b"0"));
    assert_eq!(lru.get(b"k"), Some(b"0v1".to_vec()));
    assert!(!lru.put(b"key", b"cannot-ever-fit"));
    assert_eq!(lru.max_size(), 16);
}
