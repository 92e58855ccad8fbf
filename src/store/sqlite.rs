use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, ToSql, params};

use super::schema::SCHEMA;
use super::{LeadFilter, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width UTC timestamps so the lexicographic order of stored values
/// matches chronological order; listing queries sort on these columns.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_tags(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid tags JSON in database: '{}' - {}", s, e);
        Vec::new()
    })
}

fn parse_status(s: &str) -> LeadStatus {
    s.parse().unwrap_or_else(|()| {
        tracing::error!("Invalid lead status in database: '{}'", s);
        LeadStatus::default()
    })
}

fn parse_priority(s: &str) -> LeadPriority {
    s.parse().unwrap_or_else(|()| {
        tracing::error!("Invalid lead priority in database: '{}'", s);
        LeadPriority::default()
    })
}

/// Escapes LIKE wildcards and lowercases the term for the case-insensitive
/// substring match used by customer search.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}

fn customer_from_row(row: &rusqlite::Row) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        company: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn lead_from_row(row: &rusqlite::Row) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_status(&row.get::<_, String>(4)?),
        value: row.get(5)?,
        priority: parse_priority(&row.get::<_, String>(6)?),
        source: row.get(7)?,
        assigned_to: row.get(8)?,
        notes: row.get(9)?,
        tags: parse_tags(&row.get::<_, String>(10)?),
        expected_close_date: row
            .get::<_, Option<String>>(11)?
            .map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(12)?),
        updated_at: parse_datetime(&row.get::<_, String>(13)?),
    })
}

const CUSTOMER_COLUMNS: &str = "id, owner_id, name, email, phone, company, created_at, updated_at";

const LEAD_COLUMNS: &str = "id, customer_id, title, description, status, value, priority, \
     source, assigned_to, notes, tags, expected_close_date, created_at, updated_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Principal operations

    fn create_principal(&self, principal: &Principal) -> Result<()> {
        self.conn().execute(
            "INSERT INTO principals (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                principal.id,
                principal.name,
                format_datetime(&principal.created_at),
                format_datetime(&principal.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_principal(&self, id: &str) -> Result<Option<Principal>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, created_at, updated_at FROM principals WHERE id = ?1",
            params![id],
            |row| {
                Ok(Principal {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                    updated_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_principal_by_name(&self, name: &str) -> Result<Option<Principal>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, created_at, updated_at FROM principals WHERE name = ?1",
            params![name],
            |row| {
                Ok(Principal {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                    updated_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, principal_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.principal_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, principal_id, created_at, expires_at, last_used_at
             FROM tokens WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(Token {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    principal_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Customer operations

    fn create_customer(&self, customer: &Customer) -> Result<()> {
        self.conn().execute(
            "INSERT INTO customers (id, owner_id, name, email, phone, company, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                customer.id,
                customer.owner_id,
                customer.name,
                customer.email,
                customer.phone,
                customer.company,
                format_datetime(&customer.created_at),
                format_datetime(&customer.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_owned_customer(&self, id: &str, owner_id: &str) -> Result<Option<Customer>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1 AND owner_id = ?2"),
            params![id, owner_id],
            customer_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_customers(
        &self,
        owner_id: &str,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Customer>> {
        let conn = self.conn();

        let rows = if let Some(search) = search {
            let pattern = like_pattern(search);
            let mut stmt = conn.prepare(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers
                 WHERE owner_id = ?1
                   AND (lower(name) LIKE ?2 ESCAPE '\\' OR lower(email) LIKE ?2 ESCAPE '\\')
                 ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(params![owner_id, pattern, limit, offset], customer_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![owner_id, limit, offset], customer_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        };

        rows.map_err(Error::from)
    }

    fn count_customers(&self, owner_id: &str, search: Option<&str>) -> Result<i64> {
        let conn = self.conn();
        let count = if let Some(search) = search {
            let pattern = like_pattern(search);
            conn.query_row(
                "SELECT COUNT(*) FROM customers
                 WHERE owner_id = ?1
                   AND (lower(name) LIKE ?2 ESCAPE '\\' OR lower(email) LIKE ?2 ESCAPE '\\')",
                params![owner_id, pattern],
                |row| row.get(0),
            )?
        } else {
            conn.query_row(
                "SELECT COUNT(*) FROM customers WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get(0),
            )?
        };
        Ok(count)
    }

    fn update_customer(&self, customer: &Customer) -> Result<()> {
        // owner_id and created_at are deliberately absent from the SET list
        let rows = self.conn().execute(
            "UPDATE customers SET name = ?1, email = ?2, phone = ?3, company = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                customer.name,
                customer.email,
                customer.phone,
                customer.company,
                format_datetime(&customer.updated_at),
                customer.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_customer(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM customers WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Lead operations

    fn create_lead(&self, lead: &Lead) -> Result<()> {
        self.conn().execute(
            "INSERT INTO leads (id, customer_id, title, description, status, value, priority,
                                source, assigned_to, notes, tags, expected_close_date,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                lead.id,
                lead.customer_id,
                lead.title,
                lead.description,
                lead.status.as_str(),
                lead.value,
                lead.priority.as_str(),
                lead.source,
                lead.assigned_to,
                lead.notes,
                serde_json::to_string(&lead.tags).unwrap_or_else(|_| "[]".to_string()),
                lead.expected_close_date.as_ref().map(format_datetime),
                format_datetime(&lead.created_at),
                format_datetime(&lead.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
            params![id],
            lead_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_customer_leads(&self, customer_id: &str, filter: &LeadFilter) -> Result<Vec<Lead>> {
        let conn = self.conn();
        let mut sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE customer_id = ?1");
        let mut args: Vec<&dyn ToSql> = vec![&customer_id];

        if let Some(ref status) = filter.status {
            sql.push_str(&format!(" AND status = ?{}", args.len() + 1));
            args.push(status);
        }
        if let Some(ref priority) = filter.priority {
            sql.push_str(&format!(" AND priority = ?{}", args.len() + 1));
            args.push(priority);
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args.as_slice(), lead_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_owner_leads(&self, owner_id: &str, filter: &LeadFilter) -> Result<Vec<Lead>> {
        let conn = self.conn();
        // Transitive ownership is a join, not a stored field: leads qualify
        // by their customer's owner, never by anything on the lead itself.
        let mut sql = String::from(
            "SELECT l.id, l.customer_id, l.title, l.description, l.status, l.value, l.priority,
                    l.source, l.assigned_to, l.notes, l.tags, l.expected_close_date,
                    l.created_at, l.updated_at
             FROM leads l
             JOIN customers c ON c.id = l.customer_id
             WHERE c.owner_id = ?1",
        );
        let mut args: Vec<&dyn ToSql> = vec![&owner_id];

        if let Some(ref status) = filter.status {
            sql.push_str(&format!(" AND l.status = ?{}", args.len() + 1));
            args.push(status);
        }
        if let Some(ref priority) = filter.priority {
            sql.push_str(&format!(" AND l.priority = ?{}", args.len() + 1));
            args.push(priority);
        }
        sql.push_str(" ORDER BY l.created_at DESC, l.id DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args.as_slice(), lead_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_lead(&self, lead: &Lead) -> Result<()> {
        // customer_id and created_at are deliberately absent from the SET list
        let rows = self.conn().execute(
            "UPDATE leads SET title = ?1, description = ?2, status = ?3, value = ?4,
                              priority = ?5, source = ?6, assigned_to = ?7, notes = ?8,
                              tags = ?9, expected_close_date = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                lead.title,
                lead.description,
                lead.status.as_str(),
                lead.value,
                lead.priority.as_str(),
                lead.source,
                lead.assigned_to,
                lead.notes,
                serde_json::to_string(&lead.tags).unwrap_or_else(|_| "[]".to_string()),
                lead.expected_close_date.as_ref().map(format_datetime),
                format_datetime(&lead.updated_at),
                lead.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_lead(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM leads WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn delete_customer_leads(&self, customer_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM leads WHERE customer_id = ?1",
            params![customer_id],
        )?;
        Ok(rows)
    }

    // Aggregation

    fn lead_stats_by_status(&self, owner_id: &str) -> Result<Vec<LeadStatusStat>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT l.status, COUNT(*), COALESCE(SUM(l.value), 0)
             FROM leads l
             JOIN customers c ON c.id = l.customer_id
             WHERE c.owner_id = ?1
             GROUP BY l.status
             ORDER BY l.status ASC",
        )?;

        let rows = stmt.query_map(params![owner_id], |row| {
            Ok(LeadStatusStat {
                status: row.get(0)?,
                count: row.get(1)?,
                total_value: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn lead_totals(&self, owner_id: &str) -> Result<LeadTotals> {
        let conn = self.conn();
        let (total_leads, total_value): (i64, f64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(l.value), 0)
             FROM leads l
             JOIN customers c ON c.id = l.customer_id
             WHERE c.owner_id = ?1",
            params![owner_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let avg_value = if total_leads > 0 {
            total_value / total_leads as f64
        } else {
            0.0
        };

        Ok(LeadTotals {
            total_leads,
            total_value,
            avg_value,
        })
    }
}
