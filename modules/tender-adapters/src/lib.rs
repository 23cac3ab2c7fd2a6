pub mod adapter;
pub mod chain;
pub mod feed;
pub mod html;
pub mod http;
pub mod normalize;
pub mod pagination;
pub mod rate_limit;
pub mod sources;
pub mod tagging;

pub use adapter::{AdapterContext, AdapterDescriptor, RegisteredAdapter, SourceAdapter};
pub use chain::{merge_sub_fetches, FallbackChain};
pub use http::{HttpSession, HttpSettings};
pub use pagination::{paginate, Page, PageRequest, PaginationPolicy};
pub use rate_limit::HostRateLimiter;
pub use sources::{build_adapter, build_adapters, ADAPTER_IDS};
pub use tagging::RecordTagger;
