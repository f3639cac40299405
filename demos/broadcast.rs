use lantern::{mdns::MdnsDriver, platform::DesktopPlatform, session::DiscoveryEvent, BroadcastConfig, Lantern, ServiceType};
use std::time::Duration;

fn main() {
	simple_logger::SimpleLogger::new()
		.with_level(log::LevelFilter::Info)
		.init()
		.unwrap();

	let lantern = Lantern::builder()
		.driver(MdnsDriver::new().query_interval(Duration::from_secs(2)))
		.platform(DesktopPlatform::new())
		.build()
		.unwrap();

	let broadcaster = lantern.broadcast(
		BroadcastConfig::builder(ServiceType::new("_lantern._udp").unwrap())
			.name("HELLO-WORLD")
			.port(1234)
			.add_txt("key", "value")
			.build(),
	);
	let broadcast_handle = broadcaster.start(|event| eprintln!("Broadcast event: {event:?}"));

	let (found_tx, found_rx) = std::sync::mpsc::sync_channel(0);

	let discovery_handle = lantern
		.discovery("_lantern._udp")
		.unwrap()
		.start(move |event| {
			if let DiscoveryEvent::Added(service) = event {
				found_tx.try_send(service).ok();
			}
		});

	println!("Waiting for discovery to find our own broadcast...");

	println!("{:#?}", found_rx.recv().unwrap());

	println!("Shutting down...");

	broadcast_handle.cancel();
	discovery_handle.cancel();

	println!("Done!");
}
