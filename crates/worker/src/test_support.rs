//! Fakes shared by the engine's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use shellcache_core::{Error, GenerationHandle, Network, Request, Response, Store, StoreDb, StoreHandle};

pub(crate) fn url(path: &str) -> Url {
    Url::parse("http://localhost:8080/").unwrap().join(path).unwrap()
}

pub(crate) fn page(body: &str) -> Response {
    Response::new(200, body.to_string())
        .with_status_text("OK")
        .with_header("Content-Type", "text/html")
}

/// Network that answers from a fixed table; anything else fails like an
/// offline fetch.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: HashMap<String, Response>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, path: &str, response: Response) -> Self {
        self.routes.insert(url(path).to_string(), response);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(request.url.to_string());
        self.routes
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::Network(format!("{}: offline", request.url)))
    }
}

#[derive(Default)]
struct Faults {
    reads: AtomicBool,
    writes: AtomicBool,
    keys: AtomicBool,
    deletes: Mutex<HashSet<String>>,
}

/// SQLite store whose operations can be made to fail on demand.
#[derive(Clone)]
pub(crate) struct FlakyStore {
    db: StoreDb,
    faults: Arc<Faults>,
}

impl FlakyStore {
    pub(crate) async fn new() -> Self {
        Self { db: StoreDb::open_in_memory().await.unwrap(), faults: Arc::default() }
    }

    pub(crate) fn fail_reads(&self, on: bool) {
        self.faults.reads.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, on: bool) {
        self.faults.writes.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_keys(&self, on: bool) {
        self.faults.keys.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete_of(&self, name: &str) {
        self.faults.deletes.lock().unwrap().insert(name.to_string());
    }
}

#[derive(Clone)]
pub(crate) struct FlakyHandle {
    inner: GenerationHandle,
    faults: Arc<Faults>,
}

fn injected(op: &str) -> Error {
    Error::CorruptEntry(format!("injected {op} failure"))
}

#[async_trait]
impl Store for FlakyStore {
    type Handle = FlakyHandle;

    async fn open(&self, name: &str) -> Result<FlakyHandle, Error> {
        let inner = self.db.open(name).await?;
        Ok(FlakyHandle { inner, faults: self.faults.clone() })
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        if self.faults.keys.load(Ordering::SeqCst) {
            return Err(injected("keys"));
        }
        self.db.keys().await
    }

    async fn is_installed(&self, name: &str) -> Result<bool, Error> {
        if self.faults.keys.load(Ordering::SeqCst) {
            return Err(injected("keys"));
        }
        self.db.is_installed(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.faults.deletes.lock().unwrap().contains(name) {
            return Err(injected("delete"));
        }
        self.db.delete(name).await
    }
}

#[async_trait]
impl StoreHandle for FlakyHandle {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if self.faults.reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        self.inner.match_request(request).await
    }

    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        if self.faults.writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.put(request, response).await
    }

    async fn put_all(&self, entries: &[(Request, Response)]) -> Result<(), Error> {
        if self.faults.writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.put_all(entries).await
    }

    async fn mark_installed(&self) -> Result<(), Error> {
        if self.faults.writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.mark_installed().await
    }

    async fn entry_urls(&self) -> Result<Vec<String>, Error> {
        self.inner.entry_urls().await
    }
}
