pub mod beacon;

pub use beacon::BeaconProvider;
