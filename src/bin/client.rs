use joint_hub::client::{ChatClient, HttpBackend, LogEffects};
use joint_hub::routes::chat::model::{ChatMessage, Sender};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = ":register <user> <pass> | :login <user> <pass> | :logout | :state | :quit";

fn render(message: &ChatMessage) {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "hub",
        Sender::System => "***",
    };
    if message.is_image {
        println!("{:>3} > [image, {} bytes]", who, message.text.len());
    } else {
        println!("{:>3} > {}", who, message.text);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenv::dotenv().ok();
    let base_url =
        std::env::var("JOINT_HUB_URL").unwrap_or_else(|_| "http://localhost:3000/api".into());

    let backend = match HttpBackend::new(base_url.clone()) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Failed to create HTTP client: {}", e);
            return;
        }
    };
    let mut client = ChatClient::new(backend, LogEffects);
    let Some(mut timers) = client.take_timer_events() else {
        return;
    };

    println!("JOINT HUB @ {}", base_url);
    println!("{}", USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read input: {}", e);
                        break;
                    }
                };

                let words: Vec<&str> = line.split_whitespace().collect();
                match words.as_slice() {
                    [":quit"] => break,
                    [":state"] => match serde_json::to_string_pretty(client.session()) {
                        Ok(json) => println!("{}", json),
                        Err(e) => tracing::error!("Failed to encode session: {}", e),
                    },
                    [":logout"] => {
                        client.logout();
                        println!("*** signed out");
                    }
                    [":register", user, pass] => match client.register(user, pass).await {
                        Ok(()) => println!("*** registered {}, now :login", user),
                        Err(e) => println!("*** {}", e),
                    },
                    [":login", user, pass] => match client.login(user, pass).await {
                        Ok(()) => client.messages().iter().for_each(render),
                        Err(e) => println!("*** {}", e),
                    },
                    [first, ..] if first.starts_with(':') => println!("{}", USAGE),
                    _ => {
                        // the user's own line is already on screen
                        client
                            .send(&line)
                            .await
                            .iter()
                            .filter(|m| m.sender != Sender::User)
                            .for_each(render);
                    }
                }
            }
            Some(event) = timers.recv() => {
                let message = client.timer_fired(event).await;
                render(&message);
            }
        }
    }
}
