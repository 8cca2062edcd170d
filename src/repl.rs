use std::io::{self, BufRead, Write};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use cadre_core::types::{GraphEvent, Message, SessionId};

use crate::App;

/// Print graph events for one session until its run ends.
fn spawn_printer(
    mut rx: broadcast::Receiver<GraphEvent>,
    session: SessionId,
    supervisor: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    eprintln!("[events] {} skipped", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event {
                GraphEvent::WorkerReplied {
                    session_id,
                    worker,
                    content,
                } if session_id == session => {
                    println!("--- {} ---\n{}\n", worker, content);
                }
                GraphEvent::RouteDecided { session_id, next } if session_id == session => {
                    println!(
                        "--- {} ---\nSupervisor decides the next agent: {}\n",
                        supervisor, next
                    );
                }
                GraphEvent::RouteCorrected {
                    session_id,
                    requested,
                } if session_id == session => {
                    eprintln!("[route] {} has no turns left, finishing instead", requested);
                }
                GraphEvent::TurnLimitReached {
                    session_id,
                    worker,
                    count,
                } if session_id == session => {
                    eprintln!("[turn limit] {} scheduled {} times", worker, count);
                }
                GraphEvent::RunFinished { session_id, .. } if session_id == session => {
                    println!("Process finished.");
                    break;
                }
                GraphEvent::RunFailed { session_id, error } if session_id == session => {
                    eprintln!("[error] {}", error);
                    break;
                }
                _ => {}
            }
        }
    })
}

/// Run one user input through the graph, printing as it goes.
///
/// Ctrl-C cancels the run once the step in flight completes.
pub(crate) async fn run_once(app: &App, session: &SessionId, input: &str) -> anyhow::Result<()> {
    let printer = spawn_printer(
        app.event_bus.subscribe(),
        session.clone(),
        app.graph.entry().to_string(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n[cancelling after the current step]");
                cancel.cancel();
            }
        })
    };

    let result = app
        .graph
        .invoke_with_cancel(session, vec![Message::user(input)], &cancel)
        .await;
    on_interrupt.abort();

    // The printer stops on the run's terminal event; errors raised before the
    // run started never publish one.
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;

    result.map(|_| ()).map_err(Into::into)
}

pub(crate) async fn run_repl(app: &App, mut session: SessionId) -> anyhow::Result<()> {
    println!("cadre v{}", env!("CARGO_PKG_VERSION"));
    println!("Session: {}", session);
    println!("Type /help for commands, /quit to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("You: ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break; // EOF
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" | "/q" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "/help" => {
                println!("/new       start a fresh session");
                println!("/session   show the current session id");
                println!("/sessions  list sessions seen by this process");
                println!("/state     show history length and worker turn counts");
                println!("/quit      exit");
                continue;
            }
            "/new" => {
                session = SessionId::new();
                println!("Session: {}", session);
                continue;
            }
            "/session" => {
                println!("Session ID: {}", session);
                continue;
            }
            "/sessions" => {
                for id in app.store.list_sessions()? {
                    let marker = if id == session { "*" } else { " " };
                    println!("{} {}", marker, id);
                }
                continue;
            }
            "/state" => {
                match app.graph.state(&session).await? {
                    Some(state) => {
                        println!("Messages: {}", state.messages.len());
                        match &state.next {
                            Some(next) => println!("Next: {}", next),
                            None => println!("Next: (unset)"),
                        }
                        for (worker, count) in &state.turn_counts {
                            println!("  {}: {}", worker, count);
                        }
                    }
                    None => println!("No state yet for {}", session),
                }
                continue;
            }
            _ => {}
        }

        if let Err(e) = run_once(app, &session, input).await {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}
