//! Immortal arena tests

use quill_vm_gc::ImmortalArena;

#[test]
fn test_free_owned_by_releases_only_that_owner() {
    let mut arena = ImmortalArena::new();
    let a = arena.allocate(1, "a");
    let b = arena.allocate(2, "b");
    let c = arena.allocate(1, "c");

    let mut freed = arena.free_owned_by(1);
    freed.sort();
    assert_eq!(freed, vec!["a", "c"]);
    assert_eq!(arena.len(), 1);
    assert!(arena.get(a).is_none());
    assert!(arena.get(c).is_none());
    assert_eq!(arena.get(b), Some(&"b"));

    assert!(arena.free_owned_by(1).is_empty());
}

#[test]
fn test_reused_slot_rejects_old_handle() {
    let mut arena = ImmortalArena::new();
    let old = arena.allocate(0, 10u32);
    assert_eq!(arena.free(old), Some(10));
    let new = arena.allocate(0, 20u32);

    assert_eq!(old.index(), new.index());
    assert_ne!(old, new);
    assert!(arena.get(old).is_none());
    assert_eq!(arena.free(old), None);
    assert_eq!(arena.get(new), Some(&20));
}

#[test]
fn test_iter_and_owner() {
    let mut arena = ImmortalArena::new();
    let a = arena.allocate(7, 'x');
    let b = arena.allocate(8, 'y');
    *arena.get_mut(b).unwrap() = 'z';

    let items: Vec<_> = arena.iter().map(|(h, v)| (h, *v)).collect();
    assert_eq!(items, vec![(a, 'x'), (b, 'z')]);
    assert_eq!(arena.owner_of(a), Some(7));
    assert_eq!(arena.owner_of(b), Some(8));
}
