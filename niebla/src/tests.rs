use crate as nb;

#[test]
fn basic_test() {
    // Create a small arena of strings
    let mut arena: nb::Arena<&str> = nb::Arena::with_capacity(4);

    // Pushing hands back the index of the new element
    let first = arena.push("Hola Niebla").unwrap();
    assert_eq!(first, 0);
    assert_eq!(arena[first], "Hola Niebla");
    assert_eq!(arena.len(), 1);
    assert_eq!(arena.remaining(), 3);
}

// Test that overflow is reported and carries the capacity
#[test]
fn arena_overflow() {
    let mut arena: nb::Arena<u32> = nb::Arena::with_capacity(2);

    arena.push(1).unwrap();
    arena.push(2).unwrap();
    assert_eq!(arena.push(3), Err(nb::ArenaError::Full { capacity: 2 }));

    // The failed push must not have modified the arena
    assert_eq!(arena.as_slice(), &[1, 2]);
}

#[test]
fn arena_clear_and_truncate() {
    let mut arena: nb::Arena<u32> = nb::Arena::with_capacity(8);

    for i in 0..8 {
        arena.push(i).unwrap();
    }
    assert_eq!(arena.remaining(), 0);

    arena.truncate(3);
    assert_eq!(arena.as_slice(), &[0, 1, 2]);
    assert_eq!(arena.remaining(), 5);

    arena.clear();
    assert!(arena.is_empty());

    // Capacity is freed back up after a clear
    arena.push(42).unwrap();
    assert_eq!(arena[0], 42);
}

#[test]
fn bitset_membership() {
    let mut set = nb::Bitset::with_capacity(128);

    set.set(0).unwrap();
    set.set(64).unwrap();
    set.set(127).unwrap();

    assert!(set.get(0));
    assert!(set.get(64));
    assert!(set.get(127));
    assert!(!set.get(1));

    // Out of range ids report absent rather than guessing
    assert!(!set.get(4096));
}

#[test]
fn bitset_out_of_range() {
    let mut set = nb::Bitset::with_capacity(16);

    assert_eq!(
        set.set(16),
        Err(nb::ArenaError::OutOfRange {
            index: 16,
            capacity: 16
        })
    );
}

#[test]
fn bitset_clear() {
    let mut set = nb::Bitset::with_capacity(16);

    set.set(3).unwrap();
    assert!(set.get(3));

    set.clear();
    assert!(!set.get(3));
}
