//! In-memory backend.
//!
//! All records live in one [`parking_lot::Mutex`]-guarded state shared by
//! every clone of [`MemoryStore`]. Reads take the lock briefly and clone what
//! they return; a commit validates every staged version token and uniqueness
//! rule under the lock and only then applies the writes, so a failed commit
//! leaves no trace.
//!
//! # Example
//!
//! ```
//! use registrar_persistence::backends::memory::MemoryStore;
//! use registrar_persistence::core::{RecordStorage, Transaction, TransactionProvider};
//! use registrar_persistence::tenant::{InstitutionId, PrincipalId};
//! use registrar_persistence::types::{Course, Institution};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let inst = InstitutionId::new("state-u");
//! store.put_institution(Institution::active(inst.clone(), "State U")).await?;
//! let course = store
//!     .create_course(Course::new("c-1", inst.clone(), "CS101", "Intro", 4, 30))
//!     .await?;
//! assert_eq!(course.version(), 1);
//!
//! let mut tx = store.begin_transaction(&inst).await?;
//! let mut course = tx.read_course("c-1").await?.unwrap();
//! course.add_student("s-1");
//! tx.stage_course(&course).await?;
//! Box::new(tx).commit().await?;
//!
//! let course = store.read_course(&inst, "c-1").await?.unwrap();
//! assert_eq!(course.version(), 2);
//! # Ok(())
//! # }
//! ```

mod audit;
mod storage;
mod transaction;

pub use audit::MemoryAuditSink;
pub use storage::MemoryStore;
pub use transaction::MemoryTransaction;
