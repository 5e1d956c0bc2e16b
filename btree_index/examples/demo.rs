//! Builds an index over a handful of students, then runs a few range
//! scans against it.

use btree_index::{BTreeIndex, KeyType, ScanOp};
use buffer_pool::api::BufferPoolManager;
use buffer_pool::BufferPool;
use paged_file::PagedFile;
use relation::RelationFile;
use std::rc::Rc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let relation_path = std::env::temp_dir().join("btree_index_demo_relation.db");
    let index_path = std::env::temp_dir().join("btree_index_demo_index.db");
    let _ = std::fs::remove_file(&relation_path);
    let _ = std::fs::remove_file(&index_path);

    // The relation and its index each get their own backing file and
    // buffer pool, so their page allocators never compete for the same
    // page numbers.
    let relation_pf = PagedFile::create_new(&relation_path)?;
    let relation_bpm: Rc<dyn BufferPoolManager> = Rc::new(BufferPool::new(64, relation_pf));
    let relation = RelationFile::new(relation_bpm, 4)?;
    for age in [34, 19, 28, 45, 19, 52, 23] {
        relation.append(&(age as i32).to_le_bytes())?;
    }

    let index_pf = PagedFile::create_new(&index_path)?;
    let index_bpm: Rc<dyn BufferPoolManager> = Rc::new(BufferPool::new(64, index_pf));
    let index = BTreeIndex::create(index_bpm, &relation, "students", 0, KeyType::Integer)?;
    println!("built index over {} students", 7);

    index.start_scan(20, ScanOp::Gte, 40, ScanOp::Lt)?;
    println!("students with 20 <= age < 40:");
    loop {
        match index.next() {
            Ok(rid) => println!("  page {}, slot {}", rid.page_id, rid.slot_id),
            Err(btree_index::IndexError::IndexScanCompleted) => break,
            Err(e) => return Err(e.into()),
        }
    }
    index.end_scan()?;

    index.start_scan(19, ScanOp::Gte, 19, ScanOp::Lte)?;
    println!("students aged exactly 19:");
    loop {
        match index.next() {
            Ok(rid) => println!("  page {}, slot {}", rid.page_id, rid.slot_id),
            Err(btree_index::IndexError::IndexScanCompleted) => break,
            Err(e) => return Err(e.into()),
        }
    }
    index.end_scan()?;

    drop(index);
    std::fs::remove_file(&relation_path).ok();
    std::fs::remove_file(&index_path).ok();
    Ok(())
}
