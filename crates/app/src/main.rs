use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use parley::config::{AppConfig, MODEL_SCRIPTED};
use parley::conversation::{ConversationController, SendOutcome};
use parley_llm::{EchoModel, LanguageModel, ScriptedModel};
use parley_store::{Chat, ChatStore, JsonChatStore};

const HELP: &str = "\
commands:
  :list          show all chats, most recent first
  :new           start a new chat and make it active
  :open N        make chat N from :list active
  :rename TITLE  rename the active chat
  :clear         clear the active chat's messages
  :delete N      delete chat N from :list
  :wipe          delete every chat
  :quit          save and exit
anything else is sent to the active chat.";

/// Terminal front end over the chat core. Deliberately thin: every command
/// maps onto one store or controller operation.
#[tokio::main]
async fn main() {
    let config = AppConfig::load();
    init_logging(&config.log_filter);

    let store: Arc<dyn ChatStore> = Arc::new(JsonChatStore::open(config.chats_path()));
    let model = build_model(&config);
    tracing::info!(model = %model.name(), chats = store.chats().len(), "parley ready");

    println!("parley — local chats, streamed replies. {HELP}");

    let mut active: Option<ConversationController> = None;
    let stdin = std::io::stdin();

    loop {
        print_prompt(active.as_ref());
        let Some(Ok(line)) = stdin.lock().lines().next() else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix(':') {
            if !run_command(command, &store, &model, &mut active) {
                break;
            }
            continue;
        }

        let controller = active.get_or_insert_with(|| open_chat(&store, &model, store.add_chat()));
        let before = controller.chat().messages.len();
        match controller.send_message(&line).await {
            SendOutcome::Completed => {
                for message in &controller.chat().messages[before + 1..] {
                    println!("{}", message.text);
                }
            }
            SendOutcome::RejectedEmpty | SendOutcome::RejectedBusy => {}
        }
    }

    if let Some(controller) = active.take() {
        controller.persist();
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_model(config: &AppConfig) -> Arc<dyn LanguageModel> {
    if config.model == MODEL_SCRIPTED {
        return Arc::new(ScriptedModel::replying([
            "This",
            "This is",
            "This is a",
            "This is a scripted reply.",
        ]));
    }
    Arc::new(EchoModel::new())
}

fn open_chat(
    store: &Arc<dyn ChatStore>,
    model: &Arc<dyn LanguageModel>,
    chat: Chat,
) -> ConversationController {
    ConversationController::new(store.clone(), model.clone(), chat)
}

fn print_prompt(active: Option<&ConversationController>) {
    match active {
        Some(controller) => print!("[{}] > ", controller.chat().title),
        None => print!("> "),
    }
    let _ = std::io::stdout().flush();
}

fn print_chat_list(store: &Arc<dyn ChatStore>) {
    let chats = store.chats();
    if chats.is_empty() {
        println!("no chats yet");
        return;
    }
    for (index, chat) in chats.iter().enumerate() {
        let preview = chat
            .last_message()
            .map(|message| message.text.as_str())
            .unwrap_or("(empty)");
        println!("{:>3}. {} — {}", index + 1, chat.title, preview);
    }
}

fn chat_at(store: &Arc<dyn ChatStore>, argument: &str) -> Option<Chat> {
    let index: usize = argument.trim().parse().ok()?;
    store.chats().into_iter().nth(index.checked_sub(1)?)
}

/// Executes one `:command`. Returns false when the loop should exit.
fn run_command(
    command: &str,
    store: &Arc<dyn ChatStore>,
    model: &Arc<dyn LanguageModel>,
    active: &mut Option<ConversationController>,
) -> bool {
    let (name, argument) = command
        .split_once(char::is_whitespace)
        .unwrap_or((command, ""));

    match name {
        "list" => print_chat_list(store),
        "new" => {
            if let Some(previous) = active.take() {
                previous.persist();
            }
            *active = Some(open_chat(store, model, store.add_chat()));
        }
        "open" => match chat_at(store, argument) {
            Some(chat) => {
                if let Some(previous) = active.take() {
                    previous.persist();
                }
                println!("opened '{}'", chat.title);
                *active = Some(open_chat(store, model, chat));
            }
            None => println!("no such chat, see :list"),
        },
        "rename" => match (active.as_mut(), argument.trim()) {
            (_, "") => println!("usage: :rename TITLE"),
            (None, _) => println!("no active chat"),
            (Some(controller), title) => controller.rename(title),
        },
        "clear" => match active.as_mut() {
            Some(controller) => controller.clear_messages(),
            None => println!("no active chat"),
        },
        "delete" => match chat_at(store, argument) {
            Some(chat) => {
                store.delete_chat(chat.id);
                if active.as_ref().is_some_and(|c| c.chat().id == chat.id) {
                    *active = None;
                }
                println!("deleted '{}'", chat.title);
            }
            None => println!("no such chat, see :list"),
        },
        "wipe" => {
            store.clear_all();
            *active = None;
            println!("all chats deleted");
        }
        "quit" | "q" | "exit" => {
            if let Some(controller) = active.take() {
                controller.persist();
            }
            return false;
        }
        _ => println!("{HELP}"),
    }
    true
}
