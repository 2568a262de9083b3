/// An entity mapped onto a table for query-building purposes. Mirrors the
/// shape of a plain repository entity trait: enough metadata to name a
/// table and its columns, nothing about a specific driver.
pub trait Entity {
    type Id;

    fn table_name() -> &'static str;
    fn id_column() -> &'static str;
    fn columns() -> &'static [&'static str];
    fn id(&self) -> &Self::Id;
}
