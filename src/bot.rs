//! Connection supervisor.
//!
//! Owns the IRC client, keeps it connected, and feeds every PRIVMSG through
//! the router. Reconnects are driven from a single task, so at most one
//! connect attempt is ever in flight; the engine itself never retries.

use std::sync::Arc;
use std::time::Duration;

use hearth_irc::{ClientEvent, ClientOptions, Event, IrcClient, Registration};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::IrcConfig;
use crate::router::{Reply, Roster, Router};

impl Roster for IrcClient {
    fn own_nick(&self) -> String {
        self.nick()
    }

    fn is_member(&self, channel: &str, nick: &str) -> bool {
        IrcClient::is_member(self, channel, nick)
    }
}

/// Why a connected session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Cancelled,
}

pub struct Bot {
    client: IrcClient,
    router: Arc<Router>,
    irc: IrcConfig,
}

impl Bot {
    pub fn new(irc: IrcConfig, router: Arc<Router>) -> Self {
        let client = IrcClient::new(ClientOptions {
            timeout: Duration::from_secs(irc.timeout_seconds),
            history_size: irc.history_size,
            no_duplicates: irc.no_duplicates,
        });
        Self {
            client,
            router,
            irc,
        }
    }

    pub fn client(&self) -> &IrcClient {
        &self.client
    }

    fn registration(&self) -> Registration {
        Registration {
            nick: self.irc.nick.clone(),
            user: self.irc.username().to_string(),
            realname: self.irc.realname.clone(),
            host: self.irc.host.clone(),
            port: self.irc.port,
            password: self.irc.password.clone(),
        }
    }

    fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.irc.reconnect_seconds)
    }

    /// Stay connected until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut events = self.client.subscribe();
        let registration = self.registration();

        loop {
            info!(host = %registration.host, port = registration.port, "Connecting");
            match self.client.connect(&registration).await {
                Ok(()) => {
                    if self.session(&mut events, &cancel).await == SessionEnd::Cancelled {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Connect attempt failed"),
            }

            let delay = self.reconnect_delay();
            warn!(delay_secs = delay.as_secs(), "Reconnecting after delay");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!("Supervisor stopped");
    }

    /// Handle events for one connection until it drops.
    async fn session(
        &self,
        events: &mut UnboundedReceiver<ClientEvent>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                return SessionEnd::Cancelled;
            };

            match event {
                ClientEvent::Registered { nick } => {
                    info!(nick = %nick, "Registered");
                    self.on_registered().await;
                }
                ClientEvent::Message(Event::Privmsg {
                    source,
                    target,
                    text,
                }) => {
                    let client = self.client.clone();
                    let router = Arc::clone(&self.router);
                    tokio::spawn(async move {
                        let replies = router.handle(&client, &source, &target, &text);
                        send_replies(&client, replies).await;
                    });
                }
                ClientEvent::ServerError(reason) => {
                    warn!(reason = %reason, "Server closed the link");
                }
                ClientEvent::Exception(error) => debug!(error = %error, "Connection exception"),
                // A timeout always follows its own Disconnected.
                ClientEvent::Timeout => info!("Previous connection timed out"),
                ClientEvent::Disconnected => return SessionEnd::Disconnected,
                ClientEvent::Raw(_) | ClientEvent::Message(_) => {}
            }
        }
    }

    async fn on_registered(&self) {
        if let Some(line) = self.irc.on_connect.as_deref().filter(|l| !l.trim().is_empty()) {
            if let Err(e) = self.client.send_raw(line).await {
                warn!(error = %e, "Failed to send on-connect line");
            }
        }
        for channel in &self.irc.channels {
            match self.client.join(channel).await {
                Ok(_) => info!(channel = %channel, "Joining channel"),
                Err(e) => warn!(channel = %channel, error = %e, "Failed to join channel"),
            }
        }
    }

    /// Send QUIT, waiting at most `bound` for it to go out.
    pub async fn quit(&self, bound: Duration) {
        match tokio::time::timeout(bound, self.client.quit(&self.irc.quit_message)).await {
            Ok(Ok(())) => info!("Sent QUIT"),
            Ok(Err(e)) => debug!(error = %e, "QUIT not sent"),
            Err(_) => warn!(bound_secs = bound.as_secs(), "QUIT timed out"),
        }
    }
}

async fn send_replies(client: &IrcClient, replies: Vec<Reply>) {
    for reply in replies {
        let sent = match &reply {
            Reply::Privmsg { target, text } => client.privmsg(target, text).await,
            Reply::Notice { target, text } => client.notice(target, text).await,
        };
        if let Err(e) = sent {
            warn!(error = %e, "Failed to send reply");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardType, CardVariant, Catalog};
    use crate::config::Config;
    use crate::flow_rate::FlowRateLimiter;
    use crate::router::RouterSettings;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::time::timeout;

    struct FakeServer {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl FakeServer {
        async fn accept(listener: &TcpListener) -> Self {
            let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
                .await
                .expect("bot never connected")
                .unwrap();
            let (read_half, write_half) = stream.into_split();
            Self {
                reader: BufReader::new(read_half),
                writer: write_half,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\r\n").as_bytes())
                .await
                .unwrap();
        }

        async fn recv_until(&mut self, pred: impl Fn(&str) -> bool) -> Option<String> {
            loop {
                let mut line = String::new();
                match timeout(Duration::from_secs(2), self.reader.read_line(&mut line)).await {
                    Ok(Ok(0)) | Err(_) => return None,
                    Ok(Ok(_)) if pred(line.trim_end()) => {
                        return Some(line.trim_end().to_string());
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => panic!("read error: {e}"),
                }
            }
        }
    }

    fn config(port: u16) -> Config {
        let mut config = Config::from_toml(
            r##"
            [irc]
            host = "127.0.0.1"
            nick = "hsbot"
            channels = ["#hs"]
            on_connect = "MODE hsbot +B"
            reconnect_seconds = 0

            [cards]
            source = "unused"
            "##,
        )
        .unwrap();
        config.irc.port = port;
        config
    }

    fn bot(config: &Config) -> Bot {
        let catalog = Catalog::from_cards([CardVariant {
            id: "GAME_005".into(),
            name: "The Coin".into(),
            card_type: CardType::Spell,
            ..CardVariant::default()
        }]);
        let router = Router::new(
            Arc::new(catalog),
            Arc::new(FlowRateLimiter::from_config(&config.flow_rate)),
            RouterSettings::from_config(config).unwrap(),
        );
        Bot::new(config.irc.clone(), Arc::new(router))
    }

    #[tokio::test]
    async fn registers_joins_and_answers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = config(listener.local_addr().unwrap().port());
        let bot = Arc::new(bot(&config));
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let bot = Arc::clone(&bot);
            let cancel = cancel.clone();
            async move { bot.run(cancel).await }
        });

        let mut server = FakeServer::accept(&listener).await;
        assert!(server.recv_until(|l| l.starts_with("USER ")).await.is_some());
        server.send(":irc.test 001 hsbot :Welcome").await;
        assert_eq!(
            server.recv_until(|l| l.starts_with("MODE")).await.as_deref(),
            Some("MODE hsbot +B")
        );
        assert_eq!(
            server.recv_until(|l| l.starts_with("JOIN")).await.as_deref(),
            Some("JOIN #hs")
        );

        server
            .send(":Ben!ben@ben.example PRIVMSG #hs :!card the coin")
            .await;
        let reply = server
            .recv_until(|l| l.starts_with("PRIVMSG"))
            .await
            .unwrap();
        assert!(reply.starts_with("PRIVMSG #hs :"));
        assert!(reply.contains("The Coin"));
        assert!(reply.contains("Cost: 0"));

        cancel.cancel();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_the_server_drops() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = config(listener.local_addr().unwrap().port());
        let bot = Arc::new(bot(&config));
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let bot = Arc::clone(&bot);
            let cancel = cancel.clone();
            async move { bot.run(cancel).await }
        });

        let mut first = FakeServer::accept(&listener).await;
        assert!(first.recv_until(|l| l.starts_with("NICK ")).await.is_some());
        drop(first);

        let mut second = FakeServer::accept(&listener).await;
        assert_eq!(
            second.recv_until(|l| l.starts_with("NICK ")).await.as_deref(),
            Some("NICK hsbot")
        );

        cancel.cancel();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn quit_sends_configured_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config(listener.local_addr().unwrap().port());
        config.irc.quit_message = "bye".into();
        let bot = bot(&config);

        let registration = bot.registration();
        let (accepted, connected) =
            tokio::join!(listener.accept(), bot.client().connect(&registration));
        connected.unwrap();
        let (stream, _) = accepted.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut server = FakeServer {
            reader: BufReader::new(read_half),
            writer: write_half,
        };

        bot.quit(Duration::from_secs(1)).await;
        assert_eq!(
            server.recv_until(|l| l.starts_with("QUIT")).await.as_deref(),
            Some("QUIT :bye")
        );
    }
}
