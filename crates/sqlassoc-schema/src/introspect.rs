//! Building relation descriptors from a live database.
//!
//! The association engine only needs attribute order, the primary key and
//! the foreign keys of each relation, so introspection reads exactly those
//! and nothing else (no types, defaults or indexes).

use crate::catalog::SchemaCatalog;
use asupersync::{Cx, Outcome};
use sqlassoc_core::{Connection, Dialect, Error, RelationSchema, Row, Value, sanitize_identifier};

/// A foreign key column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    /// Column on the inspected table
    pub column: String,
    /// Referenced table
    pub foreign_table: String,
}

/// A column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnEntry {
    name: String,
    /// 1-based position within the primary key, 0 when not part of it
    pk_position: i64,
}

/// Reads relation descriptors from a database.
#[derive(Debug, Clone, Copy)]
pub struct Introspector {
    dialect: Dialect,
}

impl Introspector {
    /// Create a new introspector for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Create an introspector speaking the connection's dialect.
    pub fn for_connection<C: Connection>(conn: &C) -> Self {
        Self::new(conn.dialect())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// List all table names in the database.
    pub async fn table_names<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<Vec<String>, Error> {
        let sql = match self.dialect {
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Dialect::Postgres => {
                "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public' ORDER BY table_name"
            }
            Dialect::Mysql => {
                "SELECT table_name AS table_name FROM information_schema.tables WHERE table_schema = DATABASE() ORDER BY table_name"
            }
        };

        let rows = match conn.query(cx, sql, &[]).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let names: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(0).and_then(|v| v.as_str().map(String::from)))
            .collect();

        Outcome::Ok(names)
    }

    /// Build the descriptor of one relation.
    ///
    /// A table that does not exist yields [`Error::MissingSchema`].
    #[tracing::instrument(level = "debug", skip(self, cx, conn))]
    pub async fn relation_schema<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<RelationSchema, Error> {
        let mut columns = match self.columns(cx, conn, table_name).await {
            Outcome::Ok(cols) => cols,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if columns.is_empty() {
            tracing::debug!(table = table_name, "Table not found");
            return Outcome::Err(Error::missing_schema(table_name));
        }

        let foreign_keys = match self.foreign_keys(cx, conn, table_name).await {
            Outcome::Ok(fks) => fks,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let attributes: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        columns.retain(|c| c.pk_position > 0);
        columns.sort_by_key(|c| c.pk_position);

        let mut schema = RelationSchema::new(table_name)
            .attributes(attributes)
            .primary_key(columns.into_iter().map(|c| c.name));
        for fk in foreign_keys {
            if schema.has_attribute(&fk.column) {
                schema = schema.foreign_key(fk.column, fk.foreign_table);
            }
        }

        tracing::trace!(
            table = table_name,
            attributes = schema.attributes.len(),
            foreign_keys = schema.foreign_keys.len(),
            "Introspected relation"
        );
        Outcome::Ok(schema)
    }

    /// Introspect every table into a catalog.
    #[tracing::instrument(level = "debug", skip(self, cx, conn))]
    pub async fn catalog<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<SchemaCatalog, Error> {
        let table_names = match self.table_names(cx, conn).await {
            Outcome::Ok(names) => names,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let mut catalog = SchemaCatalog::new();
        for name in table_names {
            let schema = match self.relation_schema(cx, conn, &name).await {
                Outcome::Ok(schema) => schema,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            if let Err(e) = catalog.insert(schema) {
                return Outcome::Err(e);
            }
        }

        tracing::debug!(relations = catalog.len(), "Introspected catalog");
        Outcome::Ok(catalog)
    }

    async fn columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ColumnEntry>, Error> {
        match self.dialect {
            Dialect::Sqlite => self.sqlite_columns(cx, conn, table_name).await,
            Dialect::Postgres => self.postgres_columns(cx, conn, table_name).await,
            Dialect::Mysql => self.mysql_columns(cx, conn, table_name).await,
        }
    }

    async fn sqlite_columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ColumnEntry>, Error> {
        let sql = format!("PRAGMA table_info({})", sanitize_identifier(table_name));
        let rows = match conn.query(cx, &sql, &[]).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        // `pk` is the 1-based position within the primary key
        let columns = rows
            .iter()
            .filter_map(|row| {
                Some(ColumnEntry {
                    name: row.get_named::<String>("name").ok()?,
                    pk_position: row.get_named::<i64>("pk").ok().unwrap_or(0),
                })
            })
            .collect();
        Outcome::Ok(columns)
    }

    async fn postgres_columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ColumnEntry>, Error> {
        let sql = "SELECT
                       c.column_name,
                       COALESCE(k.ordinal_position, 0) AS pk_position
                   FROM information_schema.columns c
                   LEFT JOIN information_schema.table_constraints tc
                       ON tc.table_name = c.table_name
                       AND tc.table_schema = c.table_schema
                       AND tc.constraint_type = 'PRIMARY KEY'
                   LEFT JOIN information_schema.key_column_usage k
                       ON k.constraint_name = tc.constraint_name
                       AND k.table_schema = tc.table_schema
                       AND k.column_name = c.column_name
                   WHERE c.table_name = $1 AND c.table_schema = 'public'
                   ORDER BY c.ordinal_position";

        let rows = match conn
            .query(cx, sql, &[Value::Text(table_name.to_string())])
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        Outcome::Ok(rows.iter().filter_map(column_entry).collect())
    }

    async fn mysql_columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ColumnEntry>, Error> {
        let sql = "SELECT
                       c.column_name AS column_name,
                       COALESCE(k.ordinal_position, 0) AS pk_position
                   FROM information_schema.columns c
                   LEFT JOIN information_schema.key_column_usage k
                       ON k.table_schema = c.table_schema
                       AND k.table_name = c.table_name
                       AND k.column_name = c.column_name
                       AND k.constraint_name = 'PRIMARY'
                   WHERE c.table_name = ? AND c.table_schema = DATABASE()
                   ORDER BY c.ordinal_position";

        let rows = match conn
            .query(cx, sql, &[Value::Text(table_name.to_string())])
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        Outcome::Ok(rows.iter().filter_map(column_entry).collect())
    }

    // ========================================================================
    // Foreign Key Introspection
    // ========================================================================

    async fn foreign_keys<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ForeignKeyInfo>, Error> {
        match self.dialect {
            Dialect::Sqlite => self.sqlite_foreign_keys(cx, conn, table_name).await,
            Dialect::Postgres => self.postgres_foreign_keys(cx, conn, table_name).await,
            Dialect::Mysql => self.mysql_foreign_keys(cx, conn, table_name).await,
        }
    }

    async fn sqlite_foreign_keys<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ForeignKeyInfo>, Error> {
        let sql = format!(
            "PRAGMA foreign_key_list({})",
            sanitize_identifier(table_name)
        );
        let rows = match conn.query(cx, &sql, &[]).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let fks = rows
            .iter()
            .filter_map(|row| {
                Some(ForeignKeyInfo {
                    column: row.get_named::<String>("from").ok()?,
                    foreign_table: row.get_named::<String>("table").ok()?,
                })
            })
            .collect();
        Outcome::Ok(fks)
    }

    async fn postgres_foreign_keys<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ForeignKeyInfo>, Error> {
        let sql = "SELECT
                       kcu.column_name,
                       ccu.table_name AS foreign_table_name
                   FROM information_schema.table_constraints AS tc
                   JOIN information_schema.key_column_usage AS kcu
                       ON tc.constraint_name = kcu.constraint_name
                       AND tc.table_schema = kcu.table_schema
                   JOIN information_schema.constraint_column_usage AS ccu
                       ON ccu.constraint_name = tc.constraint_name
                       AND ccu.table_schema = tc.table_schema
                   WHERE tc.constraint_type = 'FOREIGN KEY'
                       AND tc.table_name = $1
                       AND tc.table_schema = 'public'";

        let rows = match conn
            .query(cx, sql, &[Value::Text(table_name.to_string())])
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let fks = rows
            .iter()
            .filter_map(|row| {
                Some(ForeignKeyInfo {
                    column: row.get_named::<String>("column_name").ok()?,
                    foreign_table: row.get_named::<String>("foreign_table_name").ok()?,
                })
            })
            .collect();
        Outcome::Ok(fks)
    }

    async fn mysql_foreign_keys<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table_name: &str,
    ) -> Outcome<Vec<ForeignKeyInfo>, Error> {
        let sql = "SELECT
                       column_name AS column_name,
                       referenced_table_name AS referenced_table_name
                   FROM information_schema.key_column_usage
                   WHERE table_name = ?
                       AND table_schema = DATABASE()
                       AND referenced_table_name IS NOT NULL";

        let rows = match conn
            .query(cx, sql, &[Value::Text(table_name.to_string())])
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let fks = rows
            .iter()
            .filter_map(|row| {
                Some(ForeignKeyInfo {
                    column: row.get_named::<String>("column_name").ok()?,
                    foreign_table: row.get_named::<String>("referenced_table_name").ok()?,
                })
            })
            .collect();
        Outcome::Ok(fks)
    }
}

fn column_entry(row: &Row) -> Option<ColumnEntry> {
    Some(ColumnEntry {
        name: row.get_named::<String>("column_name").ok()?,
        pk_position: row.get_named::<i64>("pk_position").ok().unwrap_or(0),
    })
}
