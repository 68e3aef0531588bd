//! Namespaced semantic search over a hospital knowledge base.
//!
//! [`VectorIndex`] is the contract the RAG pipeline retrieves through: given a
//! namespace and a query text it returns scored snippets. Backends:
//! [`PineconeIndex`] (server-side embedding via integrated inference) and
//! [`QdrantIndex`] (query embedded locally through the model client).

pub mod error;
pub mod index;
#[cfg(feature = "mock")]
pub mod mock;
pub mod pinecone;
pub mod qdrant;

pub use error::IndexError;
pub use index::{SearchHit, VectorIndex};
pub use pinecone::PineconeIndex;
pub use qdrant::QdrantIndex;
