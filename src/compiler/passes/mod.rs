//! The passes of the standard pipeline.

mod encryption;
mod filter;
mod promotion;
mod rewrite;

pub use encryption::EncryptionPass;
pub use filter::FilterPass;
pub use promotion::PromotionPass;
pub use rewrite::RewritePass;
