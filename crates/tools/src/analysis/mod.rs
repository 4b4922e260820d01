//! Fact-gathering tools: BMF filtering, filing parsing, and enrichment.

mod bmf_filter;
mod enrich_org;
mod filing_parse;
mod foundation_score;

pub use bmf_filter::BmfFilterTool;
pub use enrich_org::EnrichOrgTool;
pub use filing_parse::FilingParseTool;
pub use foundation_score::FoundationScoreTool;
