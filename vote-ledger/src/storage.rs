//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `campaigns` - Campaign records (key: derived campaign address)
//! - `receipts` - Vote receipts (key: derived receipt address)
//!
//! There are no secondary indices: every record is found by recomputing its
//! address. Each mutation holds the lock of every key it touches for its
//! whole read-check-write sequence, so two writers of the same record are
//! strictly ordered while writers of disjoint records proceed in parallel.

use crate::{
    address::AddressDeriver,
    error::{Error, Result},
    types::{Address, Campaign, VoteReceipt},
    Config,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBIteratorWithThreadMode, IteratorMode, Options,
    WriteBatch, WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Column family names
const CF_CAMPAIGNS: &str = "campaigns";
const CF_RECEIPTS: &str = "receipts";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    locks: KeyLocks,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path).map_err(|e| {
            Error::Unavailable(format!("cannot create data dir {}: {}", path.display(), e))
        })?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_CAMPAIGNS, Self::cf_options_campaigns()),
            ColumnFamilyDescriptor::new(CF_RECEIPTS, Self::cf_options_receipts()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB with campaign and receipt column families");

        Ok(Self {
            db: Arc::new(db),
            locks: KeyLocks::default(),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_campaigns() -> Options {
        let mut opts = Options::default();
        // Campaigns are read on every vote, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_receipts() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        // Existence probes dominate receipt reads
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helpers

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Unavailable(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn read_record<T: DeserializeOwned>(&self, cf_name: &str, address: &Address) -> Result<Option<T>> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_pinned_cf(cf, address)? {
            Some(value) => decode(address, &value).map(Some),
            None => Ok(None),
        }
    }

    // Campaign operations

    /// Create a campaign; never overwrites an existing record
    pub fn create_campaign(&self, address: &Address, campaign: &Campaign) -> Result<()> {
        self.locks.with_locked(&[*address], || {
            let cf = self.cf_handle(CF_CAMPAIGNS)?;
            if self.db.get_pinned_cf(cf, address)?.is_some() {
                return Err(Error::AlreadyExists(*address));
            }

            let value = bincode::serialize(campaign)?;
            self.db.put_cf_opt(cf, address, value, &self.write_options())?;

            tracing::debug!(
                campaign = %address,
                options = campaign.options.len(),
                "Campaign stored"
            );

            Ok(())
        })
    }

    /// Get campaign by address
    pub fn get_campaign(&self, address: &Address) -> Result<Campaign> {
        self.read_record(CF_CAMPAIGNS, address)?
            .ok_or(Error::NotFound(*address))
    }

    /// Increment one option counter and return its new value
    ///
    /// This is the only mutation of a stored campaign; counters never decrease.
    pub fn increment_option(&self, address: &Address, option_index: u8, by: u64) -> Result<u64> {
        self.locks.with_locked(&[*address], || {
            let mut campaign = self.get_campaign(address)?;
            let votes = bump_counter(&mut campaign, option_index, by)?;

            let cf = self.cf_handle(CF_CAMPAIGNS)?;
            let value = bincode::serialize(&campaign)?;
            self.db.put_cf_opt(cf, address, value, &self.write_options())?;

            Ok(votes)
        })
    }

    /// Iterate over all campaigns (lazy, unordered; call again to restart)
    pub fn campaigns(&self) -> Result<RecordIter<'_, Campaign>> {
        let cf = self.cf_handle(CF_CAMPAIGNS)?;
        Ok(RecordIter::new(self.db.iterator_cf(cf, IteratorMode::Start)))
    }

    // Receipt operations

    /// Write a receipt unless one already exists at `address`
    ///
    /// The existence check and the write happen under the same key lock.
    pub fn create_receipt_if_absent(&self, address: &Address, receipt: &VoteReceipt) -> Result<()> {
        self.locks.with_locked(&[*address], || {
            if let Some(existing) = self.read_record::<VoteReceipt>(CF_RECEIPTS, address)? {
                return Err(already_voted(address, &existing, receipt.option_index));
            }

            let cf = self.cf_handle(CF_RECEIPTS)?;
            let value = bincode::serialize(receipt)?;
            self.db.put_cf_opt(cf, address, value, &self.write_options())?;

            tracing::debug!(receipt = %address, campaign = %receipt.campaign, "Receipt stored");

            Ok(())
        })
    }

    /// Check whether a receipt exists (no side effects)
    pub fn receipt_exists(&self, address: &Address) -> Result<bool> {
        let cf = self.cf_handle(CF_RECEIPTS)?;
        if !self.db.key_may_exist_cf(cf, address) {
            return Ok(false);
        }
        Ok(self.db.get_pinned_cf(cf, address)?.is_some())
    }

    /// Get receipt by address
    pub fn get_receipt(&self, address: &Address) -> Result<VoteReceipt> {
        self.read_record(CF_RECEIPTS, address)?
            .ok_or(Error::NotFound(*address))
    }

    /// Iterate over all receipts (lazy, unordered)
    pub fn receipts(&self) -> Result<RecordIter<'_, VoteReceipt>> {
        let cf = self.cf_handle(CF_RECEIPTS)?;
        Ok(RecordIter::new(self.db.iterator_cf(cf, IteratorMode::Start)))
    }

    // Batch operations (atomic)

    /// Record a vote: receipt write plus counter increment in one commit
    ///
    /// Fails with `AlreadyVoted` (and writes nothing) if the receipt exists.
    /// Returns the new counter value of the chosen option.
    pub fn commit_vote(
        &self,
        campaign_address: &Address,
        receipt_address: &Address,
        receipt: &VoteReceipt,
    ) -> Result<u64> {
        if receipt.campaign != *campaign_address {
            return Err(Error::AddressMismatch(format!(
                "receipt {} names campaign {}, expected {}",
                receipt_address, receipt.campaign, campaign_address
            )));
        }

        self.locks
            .with_locked(&[*campaign_address, *receipt_address], || {
                if let Some(existing) =
                    self.read_record::<VoteReceipt>(CF_RECEIPTS, receipt_address)?
                {
                    return Err(already_voted(receipt_address, &existing, receipt.option_index));
                }

                let mut campaign = self.get_campaign(campaign_address)?;
                let votes = bump_counter(&mut campaign, receipt.option_index, 1)?;

                let mut batch = WriteBatch::default();

                // 1. Receipt (the "vote recorded" fact)
                let cf_receipts = self.cf_handle(CF_RECEIPTS)?;
                batch.put_cf(cf_receipts, receipt_address, bincode::serialize(receipt)?);

                // 2. Tally
                let cf_campaigns = self.cf_handle(CF_CAMPAIGNS)?;
                batch.put_cf(cf_campaigns, campaign_address, bincode::serialize(&campaign)?);

                // Atomic commit
                self.db.write_opt(batch, &self.write_options())?;

                Ok(votes)
            })
    }

    // Repair

    /// Recompute tallies from receipts and raise any counter that fell behind
    ///
    /// Counters are never lowered; a counter above its receipt count is only
    /// reported. Receipts naming a missing campaign or an out-of-range option,
    /// or stored under an address they do not derive to, are counted as
    /// orphans. Undecodable records are skipped and counted as corrupt.
    pub fn reconcile_tallies(&self, deriver: &AddressDeriver) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        let mut counts: HashMap<Address, Vec<u64>> = HashMap::new();

        for item in self.receipts()? {
            let (address, receipt) = match item {
                Ok(record) => record,
                Err(Error::AddressMismatch(reason)) => {
                    tracing::warn!(%reason, "Skipping corrupt receipt");
                    report.corrupt_receipts += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            report.receipts_scanned += 1;

            if let Err(e) = deriver.verify_receipt(&address, &receipt) {
                tracing::warn!(receipt = %address, error = %e, "Receipt not at its derived address");
                report.orphan_receipts += 1;
                continue;
            }

            let per_option = counts.entry(receipt.campaign).or_default();
            let index = receipt.option_index as usize;
            if per_option.len() <= index {
                per_option.resize(index + 1, 0);
            }
            per_option[index] += 1;
        }

        for (campaign_address, per_option) in counts {
            let campaign = match self.get_campaign(&campaign_address) {
                Ok(campaign) => campaign,
                Err(Error::NotFound(_)) => {
                    let orphans: u64 = per_option.iter().sum();
                    tracing::warn!(
                        campaign = %campaign_address,
                        receipts = orphans,
                        "Receipts reference a missing campaign"
                    );
                    report.orphan_receipts += orphans;
                    continue;
                }
                Err(Error::AddressMismatch(reason)) => {
                    tracing::warn!(campaign = %campaign_address, %reason, "Skipping corrupt campaign");
                    report.corrupt_campaigns += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            report.campaigns_checked += 1;

            for (index, &receipt_count) in per_option.iter().enumerate() {
                let Some(option) = campaign.options.get(index) else {
                    if receipt_count > 0 {
                        tracing::warn!(
                            campaign = %campaign_address,
                            option_index = index,
                            receipts = receipt_count,
                            "Receipts reference an option outside the campaign"
                        );
                    }
                    report.orphan_receipts += receipt_count;
                    continue;
                };

                if option.votes < receipt_count {
                    let missing = receipt_count - option.votes;
                    self.increment_option(&campaign_address, index as u8, missing)?;
                    report.options_repaired += 1;
                    report.votes_restored += missing;
                    tracing::warn!(
                        campaign = %campaign_address,
                        option_index = index,
                        restored = missing,
                        "Tally behind receipts, restored"
                    );
                } else if option.votes > receipt_count {
                    report.options_over_counted += 1;
                    tracing::warn!(
                        campaign = %campaign_address,
                        option_index = index,
                        votes = option.votes,
                        receipts = receipt_count,
                        "Tally exceeds receipts, left unchanged"
                    );
                }
            }
        }

        Ok(report)
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_campaigns = self.cf_handle(CF_CAMPAIGNS)?;
        let cf_receipts = self.cf_handle(CF_RECEIPTS)?;

        Ok(StorageStats {
            total_campaigns: self.approximate_count(cf_campaigns)?,
            total_receipts: self.approximate_count(cf_receipts)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics (RocksDB estimates)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Approximate number of campaigns
    pub total_campaigns: u64,
    /// Approximate number of receipts
    pub total_receipts: u64,
}

/// Outcome of a tally repair pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Receipts read
    pub receipts_scanned: u64,
    /// Campaigns with at least one receipt
    pub campaigns_checked: u64,
    /// Option counters raised
    pub options_repaired: u64,
    /// Sum of increments applied
    pub votes_restored: u64,
    /// Option counters above their receipt count
    pub options_over_counted: u64,
    /// Receipts without a matching campaign option or derived address
    pub orphan_receipts: u64,
    /// Receipt records that could not be decoded
    pub corrupt_receipts: u64,
    /// Referenced campaign records that could not be decoded
    pub corrupt_campaigns: u64,
}

/// Lazy iterator over one column family, decoding records as it goes
pub struct RecordIter<'a, T> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    _record: PhantomData<T>,
}

impl<T> std::fmt::Debug for RecordIter<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordIter").finish_non_exhaustive()
    }
}

impl<'a, T> RecordIter<'a, T> {
    fn new(inner: DBIteratorWithThreadMode<'a, DB>) -> Self {
        Self {
            inner,
            _record: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for RecordIter<'_, T> {
    type Item = Result<(Address, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.map_err(Error::from).and_then(|(key, value)| {
            let address = Address::from_key(&key).ok_or_else(|| {
                Error::AddressMismatch(format!("malformed record key {}", hex::encode(&key)))
            })?;
            let record = decode(&address, &value)?;
            Ok((address, record))
        }))
    }
}

/// Per-record-key mutexes
///
/// Entries are created on first use and dropped once no writer holds them.
#[derive(Default)]
struct KeyLocks {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl KeyLocks {
    /// Run `f` while holding the locks of all `keys` (taken in address order)
    fn with_locked<T>(&self, keys: &[Address], f: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = keys
            .iter()
            .map(|key| self.locks.entry(*key).or_default().clone())
            .collect();

        let result = {
            let _guards: Vec<_> = mutexes.iter().map(|mutex| mutex.lock()).collect();
            f()
        };

        drop(mutexes);
        for key in &keys {
            self.locks
                .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
        }

        result
    }
}

fn decode<T: DeserializeOwned>(address: &Address, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| Error::AddressMismatch(format!("undecodable record at {}: {}", address, e)))
}

fn bump_counter(campaign: &mut Campaign, option_index: u8, by: u64) -> Result<u64> {
    let len = campaign.options.len();
    let option = campaign
        .options
        .get_mut(option_index as usize)
        .ok_or(Error::InvalidPollIndex {
            index: option_index,
            len,
        })?;

    option.votes = option
        .votes
        .checked_add(by)
        .ok_or(Error::VoteOverflow(option_index))?;

    Ok(option.votes)
}

fn already_voted(address: &Address, existing: &VoteReceipt, requested: u8) -> Error {
    Error::AlreadyVoted {
        receipt: *address,
        option_index: existing.option_index,
        replay: existing.option_index == requested,
    }
}
