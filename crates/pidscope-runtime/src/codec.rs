use std::sync::Arc;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::sandbox::VirtualFs;
use crate::{Error, Result};

/// Where the decoder expects its input
pub const DECODER_INPUT_PATH: &str = "/logfile.bbl";

/// Directory the decoder writes its tables into
pub const DECODER_OUTPUT_DIR: &str = "/";

/// Main telemetry table: `<stem>.<NN>.csv`. Auxiliary outputs such as
/// `<stem>.01.gps.csv` or `<stem>.event` do not match.
static PRIMARY_TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.+\.\d+\.csv$").expect("primary table pattern is valid")
});

/// Native blackbox decoder working against its own file store.
///
/// `decode` reads the log at `input_path` and writes zero or more text tables
/// next to it.
pub trait BlackboxDecoder: Send + Sync {
    fn name(&self) -> &str;

    fn load(&self) -> BoxFuture<'_, anyhow::Result<()>>;

    fn decode<'a>(
        &'a self,
        fs: &'a VirtualFs,
        input_path: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// A named text table produced by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTable {
    pub name: String,
    pub content: String,
}

/// Pick the main telemetry table out of a decode.
///
/// Falls back to the first `.csv` table when nothing follows the
/// `<stem>.<NN>.csv` convention.
pub fn primary_table(tables: &[DecodedTable]) -> Option<&DecodedTable> {
    tables
        .iter()
        .find(|table| PRIMARY_TABLE_NAME.is_match(&table.name))
        .or_else(|| tables.iter().find(|table| table.name.ends_with(".csv")))
}

/// Runs the blackbox decoder over raw sub-logs.
///
/// The decoder is loaded on first use. Decodes are serialized: stale tables
/// are cleared before each input is written, and a concurrent decode would
/// see the other's outputs.
pub struct CodecAdapter {
    decoder: Arc<dyn BlackboxDecoder>,
    fs: VirtualFs,
    loaded: OnceCell<std::result::Result<(), String>>,
    lock: Mutex<()>,
}

impl CodecAdapter {
    pub fn new(decoder: Arc<dyn BlackboxDecoder>) -> Self {
        Self {
            decoder,
            fs: VirtualFs::new(),
            loaded: OnceCell::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn fs(&self) -> &VirtualFs {
        &self.fs
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.loaded.get(), Some(Ok(())))
    }

    /// Decode one raw log into its text tables, in name order.
    ///
    /// An empty vector means the log held no usable telemetry.
    pub async fn decode(&self, raw: &[u8]) -> Result<Vec<DecodedTable>> {
        self.ensure_loaded().await?;

        let _guard = self.lock.lock().await;

        let stale = self.fs.clear_dir(DECODER_OUTPUT_DIR)?;
        if stale > 0 {
            debug!(stale, "Cleared stale decoder outputs");
        }

        self.fs.write(DECODER_INPUT_PATH, raw)?;
        let decoded = self.decoder.decode(&self.fs, DECODER_INPUT_PATH).await;
        self.fs.remove_if_exists(DECODER_INPUT_PATH);
        decoded.map_err(|err| Error::Decoder(format!("{:#}", err)))?;

        let mut tables = Vec::new();
        for name in self.fs.list_dir(DECODER_OUTPUT_DIR)? {
            if !name.ends_with(".csv") {
                continue;
            }
            let path = format!("{}{}", DECODER_OUTPUT_DIR, name);
            let content = self.fs.read_to_string(&path)?;
            self.fs.remove(&path)?;
            tables.push(DecodedTable { name, content });
        }

        if tables.is_empty() {
            warn!(
                decoder = self.decoder.name(),
                bytes = raw.len(),
                "Decoder produced no tables"
            );
        } else {
            debug!(
                decoder = self.decoder.name(),
                tables = tables.len(),
                "Decoded blackbox log"
            );
        }

        Ok(tables)
    }

    /// Load the decoder once. A failed load is remembered and returned to
    /// every later caller.
    pub async fn ensure_loaded(&self) -> Result<()> {
        let state = self
            .loaded
            .get_or_init(|| async {
                debug!(decoder = self.decoder.name(), "Loading blackbox decoder");
                self.decoder
                    .load()
                    .await
                    .map_err(|err| format!("failed to load {}: {:#}", self.decoder.name(), err))
            })
            .await;

        state.clone().map_err(Error::Decoder)
    }
}
