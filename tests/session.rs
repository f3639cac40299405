//! End-to-end session lifecycle tests against fake driver and platform
//! implementations.

use lantern::{
	driver::{BroadcastCallback, BroadcastEngine, DiscoveryCallback, DiscoveryEngine, Driver},
	errors::{Cause, ConfigurationError},
	platform::{Platform, PlatformConnection},
	session::{BroadcastEvent, DiscoveryEvent},
	BroadcastConfig, DiscoveredService, Lantern, ServiceType,
};
use std::{
	collections::BTreeMap,
	net::{IpAddr, Ipv4Addr},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::{Duration, Instant},
};

const PLATFORM_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
	New,
	Initialized,
	Active,
	TornDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectionState {
	New,
	Initialized,
	TornDown,
}

fn failure(message: &str) -> Cause {
	Box::new(std::io::Error::new(std::io::ErrorKind::Other, message.to_owned()))
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(5);
	while !cond() {
		assert!(Instant::now() < deadline, "timed out waiting for {what}");
		std::thread::sleep(Duration::from_millis(10));
	}
}

/* Fake driver */

struct FakeDiscoveryEngine {
	state: Mutex<EngineState>,
	callback: Mutex<Option<Arc<dyn DiscoveryCallback>>>,
	teardowns: AtomicUsize,
}
impl FakeDiscoveryEngine {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(EngineState::New),
			callback: Mutex::new(None),
			teardowns: AtomicUsize::new(0),
		})
	}

	fn state(&self) -> EngineState {
		*self.state.lock().unwrap()
	}

	fn teardowns(&self) -> usize {
		self.teardowns.load(Ordering::SeqCst)
	}

	fn callback(&self) -> Arc<dyn DiscoveryCallback> {
		self.callback.lock().unwrap().clone().expect("discovery was never started")
	}

	fn emit_resolved(&self, service: DiscoveredService) {
		self.callback().service_resolved(service);
	}

	fn emit_lost(&self, service: DiscoveredService) {
		self.callback().service_lost(service);
	}

	fn emit_failure(&self, message: &str) {
		self.callback().discovery_failed(failure(message));
	}
}

struct FakeDiscoveryHandle(Arc<FakeDiscoveryEngine>);
impl DiscoveryEngine for FakeDiscoveryHandle {
	fn initialize(&mut self) -> Result<(), Cause> {
		*self.0.state.lock().unwrap() = EngineState::Initialized;
		Ok(())
	}

	fn discover(&mut self, _address: IpAddr, callback: Arc<dyn DiscoveryCallback>) -> Result<(), Cause> {
		*self.0.state.lock().unwrap() = EngineState::Active;
		*self.0.callback.lock().unwrap() = Some(callback);
		Ok(())
	}

	fn teardown(&mut self) {
		*self.0.state.lock().unwrap() = EngineState::TornDown;
		self.0.teardowns.fetch_add(1, Ordering::SeqCst);
	}
}

struct FakeBroadcastEngine {
	state: Mutex<EngineState>,
	callback: Mutex<Option<Arc<dyn BroadcastCallback>>>,
	address: Mutex<Option<IpAddr>>,
	teardowns: AtomicUsize,
}
impl FakeBroadcastEngine {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(EngineState::New),
			callback: Mutex::new(None),
			address: Mutex::new(None),
			teardowns: AtomicUsize::new(0),
		})
	}

	fn state(&self) -> EngineState {
		*self.state.lock().unwrap()
	}

	fn teardowns(&self) -> usize {
		self.teardowns.load(Ordering::SeqCst)
	}

	fn started_address(&self) -> Option<IpAddr> {
		*self.address.lock().unwrap()
	}

	fn emit_failure(&self, message: &str) {
		self.callback
			.lock()
			.unwrap()
			.clone()
			.expect("broadcast was never started")
			.broadcast_failed(failure(message));
	}
}

struct FakeBroadcastHandle(Arc<FakeBroadcastEngine>);
impl BroadcastEngine for FakeBroadcastHandle {
	fn initialize(&mut self) -> Result<(), Cause> {
		*self.0.state.lock().unwrap() = EngineState::Initialized;
		Ok(())
	}

	fn start(&mut self, address: IpAddr, _config: &BroadcastConfig, callback: Arc<dyn BroadcastCallback>) -> Result<(), Cause> {
		*self.0.state.lock().unwrap() = EngineState::Active;
		*self.0.address.lock().unwrap() = Some(address);
		*self.0.callback.lock().unwrap() = Some(callback);
		Ok(())
	}

	fn teardown(&mut self) {
		*self.0.state.lock().unwrap() = EngineState::TornDown;
		self.0.teardowns.fetch_add(1, Ordering::SeqCst);
	}
}

struct FakeDriver {
	discovery: Arc<FakeDiscoveryEngine>,
	broadcast: Arc<FakeBroadcastEngine>,
}
impl FakeDriver {
	fn new() -> Self {
		Self {
			discovery: FakeDiscoveryEngine::new(),
			broadcast: FakeBroadcastEngine::new(),
		}
	}
}
impl Driver for FakeDriver {
	fn name(&self) -> &str {
		"fake"
	}

	fn create_discovery(&self, _service_type: &ServiceType) -> Box<dyn DiscoveryEngine> {
		Box::new(FakeDiscoveryHandle(self.discovery.clone()))
	}

	fn create_broadcast(&self) -> Box<dyn BroadcastEngine> {
		Box::new(FakeBroadcastHandle(self.broadcast.clone()))
	}
}

/* Fake platform */

struct FakeConnection {
	state: Mutex<ConnectionState>,
	teardowns: AtomicUsize,
}
impl FakeConnection {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(ConnectionState::New),
			teardowns: AtomicUsize::new(0),
		})
	}

	fn state(&self) -> ConnectionState {
		*self.state.lock().unwrap()
	}

	fn teardowns(&self) -> usize {
		self.teardowns.load(Ordering::SeqCst)
	}
}

struct FakeConnectionHandle(Arc<FakeConnection>);
impl PlatformConnection for FakeConnectionHandle {
	fn initialize(&mut self) -> Result<(), Cause> {
		*self.0.state.lock().unwrap() = ConnectionState::Initialized;
		Ok(())
	}

	fn teardown(&mut self) {
		*self.0.state.lock().unwrap() = ConnectionState::TornDown;
		self.0.teardowns.fetch_add(1, Ordering::SeqCst);
	}
}

struct FakePlatform {
	connection: Arc<FakeConnection>,
	fail_address: bool,
}
impl FakePlatform {
	fn new() -> Self {
		Self {
			connection: FakeConnection::new(),
			fail_address: false,
		}
	}

	fn with_failing_address() -> Self {
		Self {
			connection: FakeConnection::new(),
			fail_address: true,
		}
	}
}
impl Platform for FakePlatform {
	fn local_address(&self) -> std::io::Result<IpAddr> {
		if self.fail_address {
			Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no wifi address"))
		} else {
			Ok(PLATFORM_ADDR)
		}
	}

	fn create_connection(&self) -> Box<dyn PlatformConnection> {
		Box::new(FakeConnectionHandle(self.connection.clone()))
	}
}

/* Helpers */

fn service(name: &str) -> DiscoveredService {
	DiscoveredService {
		name: name.to_owned(),
		service_type: ServiceType::new("_http._tcp").unwrap(),
		ipv4: Some(Ipv4Addr::new(192, 0, 2, 10)),
		ipv6: None,
		port: 8080,
		txt_records: BTreeMap::new(),
	}
}

fn collect_discovery() -> (Arc<Mutex<Vec<DiscoveryEvent>>>, impl Fn(DiscoveryEvent) + Send + Sync + 'static) {
	let events = Arc::new(Mutex::new(Vec::new()));
	let sink = events.clone();
	(events, move |event| sink.lock().unwrap().push(event))
}

fn collect_broadcast() -> (Arc<Mutex<Vec<BroadcastEvent>>>, impl Fn(BroadcastEvent) + Send + Sync + 'static) {
	let events = Arc::new(Mutex::new(Vec::new()));
	let sink = events.clone();
	(events, move |event| sink.lock().unwrap().push(event))
}

/* Builder */

#[test]
fn building_without_a_driver_is_a_configuration_error() {
	let result = Lantern::builder().platform(FakePlatform::new()).build();
	assert!(matches!(result, Err(ConfigurationError::MissingDriver)));
}

#[test]
fn building_without_a_platform_is_a_configuration_error() {
	let result = Lantern::builder().driver(FakeDriver::new()).build();
	assert!(matches!(result, Err(ConfigurationError::MissingPlatform)));
}

/* Discovery */

#[test]
fn invalid_type_never_touches_driver_or_platform() {
	let driver = FakeDriver::new();
	let discovery = driver.discovery.clone();
	let platform = FakePlatform::new();
	let connection = platform.connection.clone();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let err = lantern.discovery("Totally Not Valid").unwrap_err();
	assert!(err.to_string().contains("Totally Not Valid"));

	assert_eq!(discovery.state(), EngineState::New);
	assert_eq!(connection.state(), ConnectionState::New);
}

#[test]
fn discovery_round_trip() {
	let driver = FakeDriver::new();
	let discovery = driver.discovery.clone();
	let platform = FakePlatform::new();
	let connection = platform.connection.clone();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	// Building the session is lazy; nothing is initialized yet
	let session = lantern.discovery("_http._tcp").unwrap();
	assert_eq!(discovery.state(), EngineState::New);
	assert_eq!(connection.state(), ConnectionState::New);

	let (events, handler) = collect_discovery();
	let handle = session.start(handler);

	assert_eq!(discovery.state(), EngineState::Active);
	assert_eq!(connection.state(), ConnectionState::Initialized);
	assert!(events.lock().unwrap().is_empty());

	let walter = service("Walter");

	discovery.emit_resolved(walter.clone());
	{
		let events = events.lock().unwrap();
		assert_eq!(events.len(), 1);
		assert!(matches!(&events[0], DiscoveryEvent::Added(s) if *s == walter));
	}

	discovery.emit_lost(walter.clone());
	{
		let events = events.lock().unwrap();
		assert_eq!(events.len(), 2);
		assert!(matches!(&events[1], DiscoveryEvent::Removed(s) if *s == walter));
	}

	handle.cancel();
	assert_eq!(discovery.state(), EngineState::TornDown);
	assert_eq!(connection.state(), ConnectionState::TornDown);

	// A cancelled session delivers nothing further
	discovery.emit_resolved(walter);
	assert_eq!(events.lock().unwrap().len(), 2);
}

#[test]
fn discovery_failure_is_terminal() {
	let driver = FakeDriver::new();
	let discovery = driver.discovery.clone();
	let platform = FakePlatform::new();
	let connection = platform.connection.clone();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let (events, handler) = collect_discovery();
	let _handle = lantern.discovery("_http._tcp").unwrap().start(handler);

	discovery.emit_failure("driver crashed");

	{
		let events = events.lock().unwrap();
		assert_eq!(events.len(), 1);
		match &events[0] {
			DiscoveryEvent::Failed(err) => {
				assert_eq!(err.driver, "fake");
				assert!(err.to_string().contains("'fake'"));
				assert_eq!(err.cause.to_string(), "driver crashed");
			}
			other => panic!("expected Failed, got {other:?}"),
		}
	}

	// No events after the terminal error
	discovery.emit_resolved(service("Walter"));
	assert_eq!(events.lock().unwrap().len(), 1);

	// The failure triggers the teardown sequence on its own
	wait_until("engine teardown", || discovery.state() == EngineState::TornDown);
	wait_until("connection teardown", || connection.state() == ConnectionState::TornDown);
}

#[test]
fn discovery_address_failure_routes_through_failed() {
	let driver = FakeDriver::new();
	let discovery = driver.discovery.clone();
	let platform = FakePlatform::with_failing_address();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let (events, handler) = collect_discovery();
	let _handle = lantern.discovery("_http._tcp").unwrap().start(handler);

	{
		let events = events.lock().unwrap();
		assert_eq!(events.len(), 1);
		match &events[0] {
			DiscoveryEvent::Failed(err) => assert_eq!(err.cause.to_string(), "no wifi address"),
			other => panic!("expected Failed, got {other:?}"),
		}
	}

	// The engine was initialized but never started discovering
	wait_until("engine teardown", || discovery.state() == EngineState::TornDown);
}

#[test]
fn double_cancel_tears_down_exactly_once() {
	let driver = FakeDriver::new();
	let discovery = driver.discovery.clone();
	let platform = FakePlatform::new();
	let connection = platform.connection.clone();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let (_events, handler) = collect_discovery();
	let handle = lantern.discovery("_http._tcp").unwrap().start(handler);

	handle.cancel();
	handle.cancel();

	assert!(handle.is_cancelled());
	assert_eq!(discovery.teardowns(), 1);
	assert_eq!(connection.teardowns(), 1);
}

#[test]
fn dropping_the_handle_cancels_the_session() {
	let driver = FakeDriver::new();
	let discovery = driver.discovery.clone();
	let platform = FakePlatform::new();
	let connection = platform.connection.clone();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let (_events, handler) = collect_discovery();
	let handle = lantern.discovery("_http._tcp").unwrap().start(handler);
	drop(handle);

	assert_eq!(discovery.state(), EngineState::TornDown);
	assert_eq!(connection.state(), ConnectionState::TornDown);
	assert_eq!(discovery.teardowns(), 1);
}

/* Broadcast */

#[test]
fn broadcast_round_trip() {
	let driver = FakeDriver::new();
	let broadcast = driver.broadcast.clone();
	let platform = FakePlatform::new();
	let connection = platform.connection.clone();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let config = BroadcastConfig::builder(ServiceType::new("_http._tcp").unwrap()).build();
	let session = lantern.broadcast(config);
	assert_eq!(broadcast.state(), EngineState::New);

	let (events, handler) = collect_broadcast();
	let handle = session.start(handler);

	assert_eq!(broadcast.state(), EngineState::Active);
	assert_eq!(connection.state(), ConnectionState::Initialized);
	assert_eq!(broadcast.started_address(), Some(PLATFORM_ADDR));

	handle.cancel();
	assert_eq!(broadcast.state(), EngineState::TornDown);
	assert_eq!(connection.state(), ConnectionState::TornDown);

	// Liveness only: a broadcast session emits no events of its own
	assert!(events.lock().unwrap().is_empty());
}

#[test]
fn broadcast_prefers_the_explicit_config_address() {
	let driver = FakeDriver::new();
	let broadcast = driver.broadcast.clone();
	let platform = FakePlatform::new();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let explicit = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));
	let config = BroadcastConfig::builder(ServiceType::new("_http._tcp").unwrap())
		.address(explicit)
		.build();

	let (_events, handler) = collect_broadcast();
	let _handle = lantern.broadcast(config).start(handler);

	assert_eq!(broadcast.started_address(), Some(explicit));
}

#[test]
fn broadcast_failure_is_terminal() {
	let driver = FakeDriver::new();
	let broadcast = driver.broadcast.clone();
	let platform = FakePlatform::new();
	let connection = platform.connection.clone();
	let lantern = Lantern::builder().driver(driver).platform(platform).build().unwrap();

	let config = BroadcastConfig::builder(ServiceType::new("_http._tcp").unwrap()).build();
	let (events, handler) = collect_broadcast();
	let _handle = lantern.broadcast(config).start(handler);

	broadcast.emit_failure("driver crashed");

	{
		let events = events.lock().unwrap();
		assert_eq!(events.len(), 1);
		let BroadcastEvent::Failed(err) = &events[0];
		assert_eq!(err.driver, "fake");
		assert_eq!(err.cause.to_string(), "driver crashed");
	}

	// Only one terminal error, ever
	broadcast.emit_failure("driver crashed again");
	assert_eq!(events.lock().unwrap().len(), 1);

	wait_until("engine teardown", || broadcast.state() == EngineState::TornDown);
	wait_until("connection teardown", || connection.state() == ConnectionState::TornDown);
}
