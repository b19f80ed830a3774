//! SQLite adapter: bar store and signal state store.

use crate::domain::error::HulltrendError;
use crate::domain::ohlcv::{Bar, SeriesKey, TIMESTAMP_FORMAT, Timeframe, parse_timestamp};
use crate::domain::signal::StateRecord;
use crate::domain::trend::TrendState;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::state_port::StatePort;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

#[derive(Clone)]
pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> HulltrendError {
    HulltrendError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> HulltrendError {
    HulltrendError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn text_timestamp(column: usize, raw: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    parse_timestamp(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            format!("invalid timestamp '{raw}'").into(),
        )
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, HulltrendError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, HulltrendError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, HulltrendError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), HulltrendError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ohlcv (
                    instrument TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (instrument, timeframe, timestamp)
                );
                CREATE TABLE IF NOT EXISTS signal_state (
                    instrument TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    state TEXT NOT NULL,
                    bar_timestamp TEXT NOT NULL,
                    PRIMARY KEY (instrument, timeframe)
                );",
            )
            .map_err(query_err)
    }

    pub fn insert_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<(), HulltrendError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv
                 (instrument, timeframe, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    instrument,
                    timeframe.as_str(),
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        tracing::debug!(instrument, %timeframe, bars = bars.len(), "stored bars");
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn get_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, HulltrendError> {
        let conn = self.conn()?;
        let since = since.map(|s| s.format(TIMESTAMP_FORMAT).to_string());

        let mut stmt = conn
            .prepare(
                "SELECT timestamp, open, high, low, close, volume
                 FROM ohlcv
                 WHERE instrument = ?1 AND timeframe = ?2
                   AND (?3 IS NULL OR timestamp >= ?3)
                 ORDER BY timestamp ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![instrument, timeframe.as_str(), since], |row| {
                let raw: String = row.get(0)?;
                Ok(Bar {
                    timestamp: text_timestamp(0, &raw)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_instruments(&self, timeframe: Timeframe) -> Result<Vec<String>, HulltrendError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT instrument FROM ohlcv WHERE timeframe = ?1 ORDER BY instrument")
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![timeframe.as_str()], |row| row.get(0))
            .map_err(query_err)?;

        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }
}

impl StatePort for SqliteAdapter {
    fn load_last_state(&self, key: &SeriesKey) -> Result<Option<StateRecord>, HulltrendError> {
        let persistence = |reason: String| HulltrendError::Persistence {
            key: key.to_string(),
            reason,
        };

        let conn = self.pool.get().map_err(|e| persistence(e.to_string()))?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT state, bar_timestamp FROM signal_state
                 WHERE instrument = ?1 AND timeframe = ?2",
                params![key.instrument, key.timeframe.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| persistence(e.to_string()))?;

        let Some((state, bar_timestamp)) = row else {
            return Ok(None);
        };
        let state: TrendState = state
            .parse()
            .map_err(|e: HulltrendError| persistence(e.to_string()))?;
        let bar_timestamp = parse_timestamp(&bar_timestamp)
            .ok_or_else(|| persistence(format!("invalid bar timestamp '{bar_timestamp}'")))?;

        Ok(Some(StateRecord {
            state,
            bar_timestamp,
        }))
    }

    fn save_last_state(
        &mut self,
        key: &SeriesKey,
        record: &StateRecord,
    ) -> Result<(), HulltrendError> {
        let persistence = |reason: String| HulltrendError::Persistence {
            key: key.to_string(),
            reason,
        };

        let conn = self.pool.get().map_err(|e| persistence(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO signal_state (instrument, timeframe, state, bar_timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.instrument,
                key.timeframe.as_str(),
                record.state.as_str(),
                record.bar_timestamp.format(TIMESTAMP_FORMAT).to_string()
            ],
        )
        .map_err(|e| persistence(e.to_string()))?;
        Ok(())
    }
}
