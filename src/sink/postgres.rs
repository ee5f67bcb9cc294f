use super::Sink;
use crate::error::{EtlError, Result};
use crate::types::SqlValue;
use ::postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use ::postgres::{Client, NoTls, Row, Statement};
use bytes::BytesMut;
use std::collections::HashMap;
use tracing::info;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

fn type_mismatch(value: &SqlValue, ty: &Type) -> BoxError {
    format!("cannot bind {value:?} to a {ty} parameter").into()
}

/// Binds by the parameter type the server inferred for the statement
impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(v) => {
                if *ty == Type::INT8 {
                    v.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)?.to_sql(ty, out)
                } else if *ty == Type::INT2 {
                    i16::try_from(*v)?.to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*v as f64).to_sql(ty, out)
                } else {
                    Err(type_mismatch(self, ty))
                }
            }
            SqlValue::Real(v) => {
                if *ty == Type::FLOAT8 {
                    v.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    Err(type_mismatch(self, ty))
                }
            }
            SqlValue::Text(v) => {
                if <&str as ToSql>::accepts(ty) {
                    v.as_str().to_sql(ty, out)
                } else {
                    Err(type_mismatch(self, ty))
                }
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn column_value(row: &Row, idx: usize) -> Result<SqlValue> {
    let ty = row.columns()[idx].type_();

    let value = if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Integer)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::from)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Integer(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Real(v.into()))
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
    } else {
        return Err(EtlError::SinkMessage(format!(
            "unexpected {ty} column in query result"
        )));
    };

    Ok(value.unwrap_or(SqlValue::Null))
}

/// PostgreSQL-backed sink over a blocking client.
///
/// Accepts either a key/value connection string
/// (`host=127.0.0.1 dbname=sparkifydb user=student password=student`) or a
/// `postgresql://` URL. Like the SQLite sink, a transaction opens with the
/// first statement after a commit.
pub struct PostgresSink {
    client: Client,
    statements: HashMap<String, Statement>,
    in_transaction: bool,
}

impl PostgresSink {
    pub fn connect(params: &str) -> Result<Self> {
        let client = Client::connect(params, NoTls)?;
        info!("Connected to PostgreSQL sink");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        PostgresSink {
            client,
            statements: HashMap::new(),
            in_transaction: false,
        }
    }

    /// Prepared once per statement text and reused for every row
    fn prepare(&mut self, statement: &str) -> Result<Statement> {
        if let Some(prepared) = self.statements.get(statement) {
            return Ok(prepared.clone());
        }
        let prepared = self.client.prepare(statement)?;
        self.statements
            .insert(statement.to_string(), prepared.clone());
        Ok(prepared)
    }

    fn begin_if_needed(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.client.batch_execute("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

fn as_params(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl Sink for PostgresSink {
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<usize> {
        self.begin_if_needed()?;

        // Statements without parameters are DDL; don't keep them prepared
        let affected = if params.is_empty() {
            self.client.execute(statement, &[])?
        } else {
            let prepared = self.prepare(statement)?;
            self.client.execute(&prepared, &as_params(params))?
        };
        Ok(affected as usize)
    }

    fn fetch_one(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<Option<Vec<SqlValue>>> {
        let prepared = self.prepare(statement)?;
        let rows = self.client.query(&prepared, &as_params(params))?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let values = (0..row.len())
            .map(|i| column_value(row, i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(values))
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.client.batch_execute("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.client.batch_execute("ROLLBACK")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StatementCatalog;
    use crate::types::{ArtistRow, Row as TableRow, SongRow, Table};

    fn bind(value: SqlValue, ty: &Type) -> std::result::Result<(IsNull, BytesMut), BoxError> {
        let mut out = BytesMut::new();
        let is_null = value.to_sql(ty, &mut out)?;
        Ok((is_null, out))
    }

    #[test]
    fn test_integers_narrow_to_column_type() {
        let (_, int4) = bind(SqlValue::Integer(44), &Type::INT4).unwrap();
        let (_, int8) = bind(SqlValue::Integer(1541121934796), &Type::INT8).unwrap();

        assert_eq!(&int4[..], &44i32.to_be_bytes());
        assert_eq!(&int8[..], &1541121934796i64.to_be_bytes());
        assert!(bind(SqlValue::Integer(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn test_null_binds_to_any_type() {
        for ty in [Type::TEXT, Type::FLOAT8, Type::INT8] {
            let (is_null, out) = bind(SqlValue::Null, &ty).unwrap();
            assert!(matches!(is_null, IsNull::Yes));
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_mismatched_types_are_rejected() {
        assert!(bind(SqlValue::from("free"), &Type::INT8).is_err());
        assert!(bind(SqlValue::Real(1.5), &Type::TEXT).is_err());

        let (_, text) = bind(SqlValue::from("paid"), &Type::TEXT).unwrap();
        assert_eq!(&text[..], b"paid");
    }

    /// Runs against a live server when SPARKIFY_TEST_POSTGRES_URL is set
    #[test]
    fn test_live_round_trip() {
        let Ok(url) = std::env::var("SPARKIFY_TEST_POSTGRES_URL") else {
            return;
        };
        let catalog = StatementCatalog::postgres();
        let mut sink = PostgresSink::connect(&url).unwrap();
        sink.drop_tables(&catalog).unwrap();
        sink.create_tables(&catalog).unwrap();

        let rows = [
            TableRow::Song(SongRow {
                song_id: "SOZCTXZ12AB0182364".to_string(),
                title: "Setanta matins".to_string(),
                artist_id: "AR5KOSW1187FB35FF4".to_string(),
                year: 0,
                duration: 269.58322,
            }),
            TableRow::Artist(ArtistRow {
                artist_id: "AR5KOSW1187FB35FF4".to_string(),
                name: "Elena".to_string(),
                location: None,
                latitude: None,
                longitude: None,
            }),
        ];
        for row in &rows {
            sink.execute(catalog.insert_for(row.table()), &row.params())
                .unwrap();
        }
        sink.rollback().unwrap();
        for row in &rows {
            sink.execute(catalog.insert_for(row.table()), &row.params())
                .unwrap();
        }
        sink.commit().unwrap();

        let found = sink
            .fetch_one(
                &catalog.song_select,
                &[
                    SqlValue::from("Setanta matins"),
                    SqlValue::from("Elena"),
                    SqlValue::Real(269.58322),
                    SqlValue::Real(0.0),
                ],
            )
            .unwrap();
        assert_eq!(
            found,
            Some(vec![
                SqlValue::from("SOZCTXZ12AB0182364"),
                SqlValue::from("AR5KOSW1187FB35FF4"),
            ])
        );

        let count = sink
            .fetch_one(&format!("SELECT COUNT(*) FROM {}", Table::Songs), &[])
            .unwrap();
        assert_eq!(count, Some(vec![SqlValue::Integer(1)]));
        sink.drop_tables(&catalog).unwrap();
    }
}
