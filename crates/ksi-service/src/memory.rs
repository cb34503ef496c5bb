//! An in-memory KSI infrastructure for tests and offline use.
//!
//! [`MemoryCalendar`] simulates the global calendar: one leaf per second,
//! leaves `0..=P` under the root at time `P`, left subtrees perfect. Only
//! leaves that were actually registered hold real hashes; every subtree with
//! no registered leaf gets a deterministic placeholder hash, which keeps the
//! tree sparse while staying consistent between publications.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ksi_core::{
    combine, AggregationHashChain, CalendarAuthenticationRecord, CalendarHashChain, Certificate,
    CertificateId, ChainLink, DataHash, DataHasher, Direction, HashAlgorithm, IdentityMetadata,
    Keypair, PublicationData, PublicationRecord, PublicationsFile, CALENDAR_LEVEL,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::connect::{Connector, Endpoint};
use crate::error::{Result, ServiceError};
use crate::traits::{AggregationResponse, AggregationService, ExtendingService, PublicationSource};

/// Status for a request the simulated service cannot serve.
pub const STATUS_INVALID_REQUEST: u32 = 0x0101;
/// Status for a time outside the calendar.
pub const STATUS_TIME_OUT_OF_RANGE: u32 = 0x0104;

/// Subject carried by certificates the memory aggregator issues.
pub const MEMORY_CERTIFICATE_SUBJECT: &str = "E=publications@guardtime.com, O=Memory Calendar";

struct CalendarInner {
    leaves: BTreeMap<u64, DataHash>,
    /// Last time handed out to an aggregation round.
    clock: u64,
    publications: Vec<PublicationRecord>,
}

/// A sparse simulated calendar.
pub struct MemoryCalendar {
    inner: RwLock<CalendarInner>,
}

impl MemoryCalendar {
    /// A calendar whose first aggregation round happens at `start_time + 1`.
    pub fn new(start_time: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(CalendarInner {
                leaves: BTreeMap::new(),
                clock: start_time,
                publications: Vec::new(),
            }),
        })
    }

    /// The current head time.
    pub fn head(&self) -> u64 {
        self.inner.read().clock
    }

    /// Move the clock forward without registering anything.
    pub fn advance(&self, seconds: u64) -> u64 {
        let mut inner = self.inner.write();
        inner.clock = inner.clock.saturating_add(seconds);
        inner.clock
    }

    /// Register `hash` as the leaf of the next round and return its time.
    pub fn register(&self, hash: DataHash) -> u64 {
        let mut inner = self.inner.write();
        inner.clock += 1;
        let time = inner.clock;
        inner.leaves.insert(time, hash);
        time
    }

    /// Root hash of the calendar at `publication_time`.
    pub fn root(&self, publication_time: u64) -> Result<DataHash> {
        let inner = self.inner.read();
        if publication_time > inner.clock {
            return Err(out_of_range(publication_time, inner.clock));
        }
        Ok(node_hash(&inner.leaves, 0, publication_time))
    }

    /// Calendar chain from the leaf at `aggregation_time` to the root at
    /// `publication_time`.
    pub fn chain(&self, aggregation_time: u64, publication_time: u64) -> Result<CalendarHashChain> {
        let inner = self.inner.read();
        if publication_time > inner.clock {
            return Err(out_of_range(publication_time, inner.clock));
        }
        if aggregation_time > publication_time {
            return Err(ServiceError::Rejected {
                status: STATUS_TIME_OUT_OF_RANGE,
                message: format!(
                    "aggregation time {aggregation_time} is after publication time {publication_time}"
                ),
            });
        }
        let input_hash = inner.leaves.get(&aggregation_time).cloned().ok_or_else(|| {
            ServiceError::Rejected {
                status: STATUS_INVALID_REQUEST,
                message: format!("no aggregation round at {aggregation_time}"),
            }
        })?;

        // Walk down from the root, collecting the sibling of every step.
        let mut top_down = Vec::new();
        let (mut start, mut remaining) = (0u64, publication_time);
        while remaining > 0 {
            let high = high_bit(remaining);
            if aggregation_time < start + high {
                let right = node_hash(&inner.leaves, start + high, remaining - high);
                top_down.push(ChainLink::left(right));
                remaining = high - 1;
            } else {
                let left = node_hash(&inner.leaves, start, high - 1);
                top_down.push(ChainLink::right(left));
                start += high;
                remaining -= high;
            }
        }
        top_down.reverse();

        Ok(CalendarHashChain {
            publication_time,
            aggregation_time,
            input_hash,
            links: top_down,
        })
    }

    /// Publish the root at `time` and remember the record.
    pub fn publish(&self, time: u64) -> Result<PublicationRecord> {
        let hash = self.root(time)?;
        let record = PublicationRecord::new(PublicationData::new(time, hash))
            .reference(format!("Memory calendar publication at {time}"))
            .repository_uri("memory://publications");

        let mut inner = self.inner.write();
        inner.publications.retain(|r| r.publication_time() != time);
        inner.publications.push(record.clone());
        debug!(time, "memory calendar published");
        Ok(record)
    }

    /// Publish the root at the current head.
    pub fn publish_head(&self) -> Result<PublicationRecord> {
        self.publish(self.head())
    }

    /// A publications file with everything published so far.
    pub fn publications_file(&self, certificates: Vec<Certificate>) -> PublicationsFile {
        let inner = self.inner.read();
        PublicationsFile::new(inner.publications.clone(), certificates, inner.clock)
    }
}

impl std::fmt::Debug for MemoryCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryCalendar")
            .field("head", &inner.clock)
            .field("leaves", &inner.leaves.len())
            .field("publications", &inner.publications.len())
            .finish()
    }
}

fn out_of_range(time: u64, head: u64) -> ServiceError {
    ServiceError::Rejected {
        status: STATUS_TIME_OUT_OF_RANGE,
        message: format!("time {time} is past the calendar head {head}"),
    }
}

/// Largest power of two not above `n` (`n > 0`).
fn high_bit(n: u64) -> u64 {
    1u64 << (63 - n.leading_zeros())
}

/// Hash of the subtree over leaves `start..=start + remaining`.
fn node_hash(leaves: &BTreeMap<u64, DataHash>, start: u64, remaining: u64) -> DataHash {
    let end = start + remaining;
    if leaves.range(start..=end).next().is_none() {
        return placeholder(start, remaining);
    }
    if remaining == 0 {
        return leaves
            .get(&start)
            .cloned()
            .unwrap_or_else(|| placeholder(start, 0));
    }

    let high = high_bit(remaining);
    let left = node_hash(leaves, start, high - 1);
    let right = node_hash(leaves, start + high, remaining - high);
    // A calendar step hashes with the right operand's algorithm.
    combine(right.algorithm(), &left, &right.imprint(), Direction::Left, CALENDAR_LEVEL)
        .unwrap_or_else(|_| placeholder(start, remaining))
}

fn placeholder(start: u64, remaining: u64) -> DataHash {
    let mut hasher = match DataHasher::new(HashAlgorithm::Sha2_256) {
        Ok(hasher) => hasher,
        Err(_) => return DataHash::zero(HashAlgorithm::Sha2_256),
    };
    hasher
        .add_data(b"memory-calendar")
        .add_data(&start.to_be_bytes())
        .add_data(&remaining.to_be_bytes());
    hasher.hash()
}

/// A signing gateway plus aggregator in front of a [`MemoryCalendar`].
///
/// Each request becomes its own aggregation round. The response carries two
/// aggregation chains (gateway then top aggregator), the calendar chain to the
/// round's own root, and an authentication record signed with the
/// aggregator's key.
pub struct MemoryAggregator {
    calendar: Arc<MemoryCalendar>,
    keypair: Keypair,
    certificate: Certificate,
    client_id: String,
    gateway_id: String,
    algorithm: HashAlgorithm,
    requests: AtomicUsize,
}

impl MemoryAggregator {
    pub fn new(calendar: Arc<MemoryCalendar>, keypair: Keypair) -> Self {
        let certificate = Certificate::new(MEMORY_CERTIFICATE_SUBJECT, keypair.public_key(), 0, u64::MAX);
        Self {
            calendar,
            keypair,
            certificate,
            client_id: "anon".to_string(),
            gateway_id: "GT".to_string(),
            algorithm: HashAlgorithm::Sha2_256,
            requests: AtomicUsize::new(0),
        }
    }

    /// Identity the gateway records for the requesting client.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_gateway_id(mut self, gateway_id: impl Into<String>) -> Self {
        self.gateway_id = gateway_id.into();
        self
    }

    /// Algorithm of the returned aggregation chains.
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Replace the signing certificate, e.g. to give it a validity window.
    pub fn with_certificate(mut self, valid_from: u64, valid_until: u64) -> Self {
        self.certificate = Certificate::new(
            self.certificate.subject.clone(),
            self.keypair.public_key(),
            valid_from,
            valid_until,
        );
        self
    }

    /// The certificate authentication records are signed under.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn certificate_id(&self) -> CertificateId {
        self.certificate.id
    }

    /// Number of signing requests served.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn sibling(&self, label: &str, time: u64) -> Result<DataHash> {
        let mut hasher = DataHasher::new(self.algorithm).map_err(|e| invalid(e.to_string()))?;
        hasher.add_data(label.as_bytes()).add_data(&time.to_be_bytes());
        Ok(hasher.hash())
    }
}

fn invalid(message: String) -> ServiceError {
    ServiceError::Rejected {
        status: STATUS_INVALID_REQUEST,
        message,
    }
}

impl AggregationService for MemoryAggregator {
    fn sign(&self, hash: &DataHash, level: u8) -> Result<AggregationResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let time = self.calendar.head() + 1;

        let mut gateway = AggregationHashChain {
            aggregation_time: time,
            chain_index: Vec::new(),
            input_hash: hash.clone(),
            aggregation_algorithm: self.algorithm,
            links: vec![
                ChainLink::metadata(
                    Direction::Left,
                    IdentityMetadata::new(self.client_id.clone()).request_time(time),
                ),
                ChainLink::right(self.sibling("gateway", time)?),
            ],
        };
        let gateway_out = gateway.output(level).map_err(|e| invalid(e.to_string()))?;

        let top = AggregationHashChain {
            aggregation_time: time,
            chain_index: Vec::new(),
            input_hash: gateway_out.hash,
            aggregation_algorithm: self.algorithm,
            links: vec![
                ChainLink::left(self.sibling("aggregator", time)?),
                ChainLink::metadata(Direction::Left, IdentityMetadata::new(self.gateway_id.clone())),
            ],
        };
        let root = top.output(gateway_out.level).map_err(|e| invalid(e.to_string()))?;

        let top_shape = top.shape().ok_or_else(|| invalid("chain too long".into()))?;
        let gateway_shape = gateway.shape().ok_or_else(|| invalid("chain too long".into()))?;
        let top = AggregationHashChain {
            chain_index: vec![top_shape],
            ..top
        };
        gateway.chain_index = vec![top_shape, gateway_shape];

        let registered = self.calendar.register(root.hash);
        let calendar_chain = self.calendar.chain(registered, registered)?;
        let publication = PublicationData::new(registered, self.calendar.root(registered)?);
        let auth_record =
            CalendarAuthenticationRecord::sign(publication, &self.keypair, self.certificate.id);

        debug!(time = registered, level, "memory aggregator signed");

        Ok(AggregationResponse {
            aggregation_chains: vec![
                AggregationHashChain {
                    aggregation_time: registered,
                    ..gateway
                },
                AggregationHashChain {
                    aggregation_time: registered,
                    ..top
                },
            ],
            calendar_hash_chain: Some(calendar_chain),
            calendar_authentication_record: Some(auth_record),
        })
    }
}

impl std::fmt::Debug for MemoryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAggregator")
            .field("client_id", &self.client_id)
            .field("gateway_id", &self.gateway_id)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// An extender over a [`MemoryCalendar`].
#[derive(Debug)]
pub struct MemoryExtender {
    calendar: Arc<MemoryCalendar>,
    requests: AtomicUsize,
}

impl MemoryExtender {
    pub fn new(calendar: Arc<MemoryCalendar>) -> Self {
        Self {
            calendar,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of extension requests served.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ExtendingService for MemoryExtender {
    fn extend(
        &self,
        aggregation_time: u64,
        publication_time: Option<u64>,
    ) -> Result<CalendarHashChain> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let target = publication_time.unwrap_or_else(|| self.calendar.head());
        self.calendar.chain(aggregation_time, target)
    }
}

/// A publication source serving a replaceable file.
#[derive(Debug)]
pub struct MemoryPublicationSource {
    file: RwLock<PublicationsFile>,
    unavailable: RwLock<bool>,
    fetches: AtomicUsize,
}

impl MemoryPublicationSource {
    pub fn new(file: PublicationsFile) -> Self {
        Self {
            file: RwLock::new(file),
            unavailable: RwLock::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Serve `file` from the next fetch on.
    pub fn set(&self, file: PublicationsFile) {
        *self.file.write() = file;
    }

    /// Make fetches fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PublicationSource for MemoryPublicationSource {
    fn fetch(&self) -> Result<PublicationsFile> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.unavailable.read() {
            return Err(ServiceError::Transport("publications file unreachable".into()));
        }
        Ok(self.file.read().clone())
    }
}

/// A connector that hands out one in-memory deployment for every endpoint
/// and records the endpoints it was asked for.
#[derive(Debug)]
pub struct MemoryConnector {
    aggregator: Arc<MemoryAggregator>,
    extender: Arc<MemoryExtender>,
    publications: Arc<MemoryPublicationSource>,
    endpoints: RwLock<Vec<Endpoint>>,
}

impl MemoryConnector {
    pub fn new(
        aggregator: Arc<MemoryAggregator>,
        extender: Arc<MemoryExtender>,
        publications: Arc<MemoryPublicationSource>,
    ) -> Self {
        Self {
            aggregator,
            extender,
            publications,
            endpoints: RwLock::new(Vec::new()),
        }
    }

    /// Endpoints requested so far, in order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.read().clone()
    }

    fn record(&self, endpoint: &Endpoint) {
        debug!(url = %endpoint.url, timeout = ?endpoint.timeout, "memory connector");
        self.endpoints.write().push(endpoint.clone());
    }
}

impl Connector for MemoryConnector {
    fn aggregator(&self, endpoint: &Endpoint) -> Result<Arc<dyn AggregationService>> {
        self.record(endpoint);
        let service: Arc<dyn AggregationService> = self.aggregator.clone();
        Ok(service)
    }

    fn extender(&self, endpoint: &Endpoint) -> Result<Arc<dyn ExtendingService>> {
        self.record(endpoint);
        let service: Arc<dyn ExtendingService> = self.extender.clone();
        Ok(service)
    }

    fn publication_source(&self, endpoint: &Endpoint) -> Result<Arc<dyn PublicationSource>> {
        self.record(endpoint);
        let source: Arc<dyn PublicationSource> = self.publications.clone();
        Ok(source)
    }
}

/// A collaborator that always fails. Implements every service trait.
#[derive(Debug, Clone)]
pub struct FailingService {
    error: ServiceError,
}

impl FailingService {
    pub fn new(error: ServiceError) -> Self {
        Self { error }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ServiceError::Transport(message.into()))
    }

    pub fn timeout() -> Self {
        Self::new(ServiceError::Timeout("no response".into()))
    }
}

impl AggregationService for FailingService {
    fn sign(&self, _hash: &DataHash, _level: u8) -> Result<AggregationResponse> {
        Err(self.error.clone())
    }
}

impl ExtendingService for FailingService {
    fn extend(&self, _aggregation_time: u64, _publication_time: Option<u64>) -> Result<CalendarHashChain> {
        Err(self.error.clone())
    }
}

impl PublicationSource for FailingService {
    fn fetch(&self) -> Result<PublicationsFile> {
        Err(self.error.clone())
    }
}
