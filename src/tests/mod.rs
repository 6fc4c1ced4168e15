mod integration_test;

use crate::broker::Broker;
use crate::client::Client;
use crate::config::{BrokerSettings, ClientSettings};

pub(crate) async fn start_broker() -> Broker {
    crate::utils::logging::init("warn");
    Broker::start(&BrokerSettings::ephemeral())
        .await
        .expect("broker failed to start")
}

pub(crate) async fn start_client(broker: &Broker, name: &str) -> Client {
    let mut client = Client::new(broker.addrs(), ClientSettings::default().with_name(name));
    client.start().await.expect("client failed to start");
    client
}
