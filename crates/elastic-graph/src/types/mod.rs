//! Core types shared by the compiler, the backends and the resolver.

mod arguments;
mod field;
mod lookup;
mod pagination;
mod query;
mod response;

pub use arguments::{ArgumentDescriptor, ArgumentKind, SchemaArguments};
pub use field::{FieldKind, FieldSpec, FieldType, ScalarType};
pub use lookup::{Clause, LookupKind, LookupRequest, Occur, RangeBound};
pub use pagination::{
    Edge, MAX_CURSOR_OFFSET, PageInfo, PageWindow, cursor_to_offset, offset_to_cursor,
};
pub use query::{EsQuery, QueryBuilder, SortOrder, SourceFilter};
pub use response::{ConnectionExtras, ConnectionPage, Node, OutputField, SearchHit, SearchResponse};
