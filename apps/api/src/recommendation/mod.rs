// Mock recommendation flow: a stand-in for a real resume analysis service.
// Returns a fixed role list after an artificial delay. File content is never read.

pub mod analyzer;
pub mod flow;
pub mod handlers;
