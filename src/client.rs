//! DynamoDB client module.
//!
//! Provides a blocking DynamoDB client that supports multiple credential
//! sources:
//! - Environment variables
//! - Hardcoded credentials
//! - AWS profiles
//!
//! The main struct is [`DynamoClient`], which wraps the AWS SDK client
//! and a Tokio runtime. Every method blocks the invoking thread until
//! its underlying request completes; the async functions in
//! [`crate::operations`] are the non-blocking surface, and this facade
//! passes their results and errors through unchanged.

use std::sync::Arc;

use aws_config::meta::region::RegionProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::Client;
use once_cell::sync::Lazy;
use tokio::runtime::Runtime;

use crate::condition::Filter;
use crate::errors::Error;
use crate::mapper::{Mapper, UpdateItem};
use crate::operations;
use crate::operations::{QueryRequest, ScanRequest};
use crate::paginate::{Page, PageSource, Paginator};
use crate::schema::{Entity, Tracked};
use crate::value::Item;

/// Shared Tokio runtime used when no explicit worker-thread count is
/// requested. A single runtime avoids deadlocks on Windows when
/// multiple clients are created.
static RUNTIME: Lazy<Arc<Runtime>> =
    Lazy::new(|| Arc::new(Runtime::new().expect("Failed to create global Tokio runtime")));

/// Executor configuration for the blocking facade.
///
/// The default (`worker_threads: None`) shares one process-wide runtime
/// sized by Tokio's own default, the number of CPU cores. Setting a
/// thread count gives the client a dedicated runtime of that size.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub worker_threads: Option<usize>,
}

/// Client configuration.
///
/// Credential priority, highest first:
/// 1. Hardcoded credentials (`access_key` + `secret_key`, optional
///    `session_token`)
/// 2. AWS profile from `~/.aws/credentials`
/// 3. Environment variables / default credential chain
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// AWS region. Falls back to `AWS_REGION`, `AWS_DEFAULT_REGION`,
    /// then `us-east-1`.
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub session_token: Option<String>,
    pub profile: Option<String>,
    /// Custom endpoint URL for local testing (localstack, moto).
    pub endpoint_url: Option<String>,
    pub runtime: RuntimeConfig,
}

/// Blocking DynamoDB client.
///
/// # Examples
///
/// ```no_run
/// use dynamap::client::{ClientConfig, DynamoClient};
///
/// // Use environment variables
/// let client = DynamoClient::new(ClientConfig::default()).unwrap();
///
/// // Use a local endpoint
/// let client = DynamoClient::new(ClientConfig {
///     endpoint_url: Some("http://localhost:4566".to_string()),
///     ..Default::default()
/// })
/// .unwrap();
/// ```
pub struct DynamoClient {
    client: Client,
    runtime: Arc<Runtime>,
    region: String,
}

impl DynamoClient {
    /// Create a new client from the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let runtime = match config.runtime.worker_threads {
            None => RUNTIME.clone(),
            Some(threads) => Arc::new(
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(threads)
                    .enable_all()
                    .build()
                    .map_err(|e| Error::Service {
                        code: None,
                        message: format!("failed to create runtime: {}", e),
                    })?,
            ),
        };

        let region = config.region.clone().unwrap_or_else(|| {
            std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|_| "us-east-1".to_string())
        });

        let client = runtime.block_on(build_client(config));

        Ok(DynamoClient {
            client,
            runtime,
            region,
        })
    }

    /// The configured AWS region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The underlying SDK client, for callers that want the async
    /// surface directly.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Check connectivity with a one-table ListTables call.
    pub fn ping(&self) -> Result<(), Error> {
        self.runtime
            .block_on(async { self.client.list_tables().limit(1).send().await })
            .map_err(|e| crate::errors::map_sdk_error(e, None))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw item operations
    // ------------------------------------------------------------------

    /// Put an item, optionally guarded by a condition.
    pub fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Filter>,
    ) -> Result<(), Error> {
        self.runtime
            .block_on(operations::put_item(&self.client, table, item, condition))
    }

    /// Get an item by key.
    pub fn get_item(&self, table: &str, key: Item, consistent: bool) -> Result<Option<Item>, Error> {
        self.runtime
            .block_on(operations::get_item(&self.client, table, key, consistent))
    }

    /// Delete an item by key, optionally guarded by a condition.
    pub fn delete_item(
        &self,
        table: &str,
        key: Item,
        condition: Option<&Filter>,
    ) -> Result<(), Error> {
        self.runtime
            .block_on(operations::delete_item(&self.client, table, key, condition))
    }

    /// Apply an attribute-updates map to an item.
    pub fn update_item(&self, table: &str, key: Item, updates: UpdateItem) -> Result<(), Error> {
        self.runtime
            .block_on(operations::update_item(&self.client, table, key, updates))
    }

    /// Get multiple items by key (100-key chunks).
    pub fn batch_get(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Item>, Error> {
        self.runtime
            .block_on(operations::batch_get_item(&self.client, table, keys))
    }

    /// Put and/or delete multiple items (25-request chunks).
    pub fn batch_write(
        &self,
        table: &str,
        puts: Vec<Item>,
        deletes: Vec<Item>,
    ) -> Result<(), Error> {
        self.runtime.block_on(operations::batch_write_item(
            &self.client,
            table,
            puts,
            deletes,
        ))
    }

    // ------------------------------------------------------------------
    // Paginated traversals
    // ------------------------------------------------------------------

    /// Fetch a single page of query results, no continuation.
    pub fn query_page(&self, request: &QueryRequest) -> Result<Page, Error> {
        self.runtime
            .block_on(operations::query_page(&self.client, request, None))
    }

    /// Fetch a single page of scan results, no continuation.
    pub fn scan_page(&self, request: &ScanRequest) -> Result<Page, Error> {
        self.runtime
            .block_on(operations::scan_page(&self.client, request, None))
    }

    /// Eagerly drain a query across all pages.
    pub fn query(&self, request: QueryRequest) -> Result<Vec<Item>, Error> {
        self.query_iter(request).collect_all()
    }

    /// Lazy query traversal. Pages are fetched on demand as the
    /// iterator is pulled.
    pub fn query_iter(&self, request: QueryRequest) -> Paginator<QuerySource> {
        let start = request.exclusive_start_key.clone();
        Paginator::new(
            QuerySource {
                client: self.client.clone(),
                runtime: self.runtime.clone(),
                request,
            },
            start,
        )
    }

    /// Eagerly drain a scan across all pages.
    pub fn scan(&self, request: ScanRequest) -> Result<Vec<Item>, Error> {
        self.scan_iter(request).collect_all()
    }

    /// Lazy scan traversal.
    pub fn scan_iter(&self, request: ScanRequest) -> Paginator<ScanSource> {
        let start = request.exclusive_start_key.clone();
        Paginator::new(
            ScanSource {
                client: self.client.clone(),
                runtime: self.runtime.clone(),
                request,
            },
            start,
        )
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    /// Put a whole entity.
    pub fn save<E: Entity>(&self, mapper: &Mapper<E>, entity: &E) -> Result<(), Error> {
        self.put_item(mapper.table(), mapper.to_item(entity), None)
    }

    /// Partial update: write only the fields changed since load, then
    /// mark the entity clean. A clean entity is a no-op.
    pub fn save_changes<E: Entity>(
        &self,
        mapper: &Mapper<E>,
        tracked: &mut Tracked<E>,
    ) -> Result<(), Error> {
        if !tracked.is_dirty() {
            return Ok(());
        }
        let key = mapper.create_key(tracked.get())?;
        let updates = mapper.to_update_item_tracked(tracked);
        self.update_item(mapper.table(), key, updates)?;
        tracked.clear_dirty();
        Ok(())
    }

    /// Load the entity whose key fields are set on `key_holder`.
    pub fn load<E: Entity>(
        &self,
        mapper: &Mapper<E>,
        key_holder: &E,
        consistent: bool,
    ) -> Result<Option<E>, Error> {
        let key = mapper.create_key(key_holder)?;
        let item = self.get_item(mapper.table(), key, consistent)?;
        mapper.to_entity(item.as_ref())
    }

    /// Load with change tracking enabled; the result starts clean.
    pub fn load_tracked<E: Entity>(
        &self,
        mapper: &Mapper<E>,
        key_holder: &E,
        consistent: bool,
    ) -> Result<Option<Tracked<E>>, Error> {
        Ok(self.load(mapper, key_holder, consistent)?.map(Tracked::new))
    }

    /// Delete the entity whose key fields are set on `key_holder`.
    pub fn remove<E: Entity>(&self, mapper: &Mapper<E>, key_holder: &E) -> Result<(), Error> {
        let key = mapper.create_key(key_holder)?;
        self.delete_item(mapper.table(), key, None)
    }

    /// Eager query decoded through a mapper. The request's table must
    /// match the mapper's binding.
    pub fn query_as<E: Entity>(
        &self,
        mapper: &Mapper<E>,
        request: QueryRequest,
    ) -> Result<Vec<E>, Error> {
        mapper.check_table(&request.table)?;
        decode_items(mapper, self.query(request)?)
    }

    /// Eager scan decoded through a mapper.
    pub fn scan_as<E: Entity>(
        &self,
        mapper: &Mapper<E>,
        request: ScanRequest,
    ) -> Result<Vec<E>, Error> {
        mapper.check_table(&request.table)?;
        decode_items(mapper, self.scan(request)?)
    }
}

fn decode_items<E: Entity>(mapper: &Mapper<E>, items: Vec<Item>) -> Result<Vec<E>, Error> {
    let mut entities = Vec::with_capacity(items.len());
    for item in items {
        if let Some(entity) = mapper.to_entity(Some(&item))? {
            entities.push(entity);
        }
    }
    Ok(entities)
}

/// Page source that drives a query traversal over the blocking runtime.
pub struct QuerySource {
    client: Client,
    runtime: Arc<Runtime>,
    request: QueryRequest,
}

impl PageSource for QuerySource {
    fn fetch(&mut self, start_key: Option<Item>) -> Result<Page, Error> {
        self.runtime
            .block_on(operations::query_page(&self.client, &self.request, start_key))
    }
}

/// Page source that drives a scan traversal over the blocking runtime.
pub struct ScanSource {
    client: Client,
    runtime: Arc<Runtime>,
    request: ScanRequest,
}

impl PageSource for ScanSource {
    fn fetch(&mut self, start_key: Option<Item>) -> Result<Page, Error> {
        self.runtime
            .block_on(operations::scan_page(&self.client, &self.request, start_key))
    }
}

/// Build the AWS SDK DynamoDB client with the given configuration.
async fn build_client(config: ClientConfig) -> Client {
    let region_provider =
        RegionProviderChain::first_try(config.region.map(aws_sdk_dynamodb::config::Region::new))
            .or_default_provider()
            .or_else("us-east-1");

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);

    // Credentials priority: hardcoded > profile > env/default chain
    if let (Some(ak), Some(sk)) = (config.access_key, config.secret_key) {
        let creds = Credentials::new(ak, sk, config.session_token, None, "dynamap-hardcoded");
        config_loader = config_loader.credentials_provider(creds);
    } else if let Some(profile_name) = config.profile {
        let profile_provider = ProfileFileCredentialsProvider::builder()
            .profile_name(&profile_name)
            .build();
        config_loader = config_loader.credentials_provider(profile_provider);
    }

    let sdk_config = config_loader.load().await;

    let mut dynamo_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

    if let Some(url) = config.endpoint_url {
        dynamo_config = dynamo_config.endpoint_url(url);
    }

    Client::from_conf(dynamo_config.build())
}
