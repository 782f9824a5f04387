//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::nodes;

/// Database row for one graph node: the soul plus its serialized field map.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = nodes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NodeRow {
    pub soul: String,
    pub payload: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_row_is_insertable() {
        // Type check - if this compiles, the Insertable derive works
        let _row = NodeRow {
            soul: "users/alice".to_string(),
            payload: "{}".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };
    }
}
