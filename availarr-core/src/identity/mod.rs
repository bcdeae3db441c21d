//! Library item → canonical identity.

pub mod cache;
pub mod fuzzy;
pub mod guid;
pub mod resolver;

pub use cache::{CacacheIdentityCache, IdentityCache, InMemoryIdentityCache};
pub use fuzzy::{MIN_ACCEPT_SCORE, best_match, normalize_title, score_candidate};
pub use guid::{ParsedIdentifiers, parse_identifiers};
pub use resolver::{IdentityResolver, Resolution, ResolutionMethod, ResolveRequest};
