use lantern::{mdns::MdnsDriver, platform::DesktopPlatform, session::DiscoveryEvent, Lantern};
use std::time::Duration;

fn main() {
	simple_logger::SimpleLogger::new()
		.with_level(log::LevelFilter::Info)
		.init()
		.unwrap();

	let lantern = Lantern::builder()
		.driver(MdnsDriver::new())
		.platform(DesktopPlatform::new())
		.build()
		.unwrap();

	let handle = lantern
		.discovery("_googlecast._tcp")
		.unwrap()
		.start(|event| match event {
			DiscoveryEvent::Added(service) => {
				println!(
					"Found Chromecast {} at {}:{}",
					service.name,
					service.host().expect("resolved services always have an address"),
					service.port
				);
			}

			DiscoveryEvent::Removed(service) => {
				println!("Chromecast {} has gone away", service.name);
			}

			DiscoveryEvent::Failed(err) => {
				eprintln!("Discovery failed: {err}");
			}
		});

	println!("Browsing for Chromecasts for 60 seconds...");
	std::thread::sleep(Duration::from_secs(60));

	handle.cancel();
}
