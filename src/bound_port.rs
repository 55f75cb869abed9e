use anyhow::Context;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Orbit, Rocket};
use tokio::sync::watch;

/// Pairs a liftoff fairing with a handle that resolves to the port the
/// server actually bound, which differs from the configured one when the
/// configuration asks for port 0.
pub fn port_channel() -> (PortReporter, BoundPort) {
    let (sender, receiver) = watch::channel(None);
    (PortReporter { sender }, BoundPort { receiver })
}

pub struct BoundPort {
    receiver: watch::Receiver<Option<u16>>,
}

impl BoundPort {
    pub async fn get(&mut self) -> Result<u16, anyhow::Error> {
        let port = *self
            .receiver
            .wait_for(Option::is_some)
            .await
            .context("The server stopped before reporting its port.")?;
        port.context("The server reported no port.")
    }
}

pub struct PortReporter {
    sender: watch::Sender<Option<u16>>,
}

#[rocket::async_trait]
impl Fairing for PortReporter {
    fn info(&self) -> Info {
        Info {
            name: "Bound port reporter",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let port = rocket.config().port;
        tracing::info!(port, "Server is listening");
        self.sender.send_replace(Some(port));
    }
}
