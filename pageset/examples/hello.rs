use anyhow::Result;

use pageset::{Direction, Id2l, Idl};

fn main() -> Result<()> {
    // Pages freed by a transaction, in the order they were freed
    let mut free = Idl::new()?;
    for page in [5, 1, 9, 3] {
        free.append(page)?;
    }

    // Sort once, largest first, before using the list
    free.sort();
    assert_eq!(free.as_slice(), &[9, 5, 3, 1]);
    assert_eq!(free.search(5, Direction::Descending)?, 1);

    // Pages dirtied by the transaction, mapped to slots in our own page arena
    let mut arena: Vec<String> = vec![];
    let mut dirty = Id2l::new();
    for page in [10, 3, 7] {
        arena.push(format!("copy of page {page}"));
        dirty.insert(page, arena.len() - 1)?;
    }

    // A page is only ever dirtied once per transaction
    assert!(dirty.insert(7, 0).is_err());

    for entry in &dirty {
        println!("{}: {}", entry.id, arena[entry.payload]);
    }

    // The free list can be stored as a page image
    let image = free.encode()?;
    let restored = Idl::decode(&image, free.config())?;
    assert_eq!(restored, free);

    Ok(())
}
