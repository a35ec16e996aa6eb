//! Line-oriented play over stdin and stdout.
//!
//! - Lines starting with `#` are commands (talk, present, map, accuse, ...)
//! - Everything else is said to the current actor
//! - Output lines are tagged (`[LEIA]`, `[EVIDENCE]`, `[ERROR]`, ...)

use mystery_core::data::MapPage;
use mystery_core::regions::MapAction;
use mystery_core::{DialogueOutcome, HeadlessConfig, HeadlessGame, Notice, SessionError};
use std::io::{self, BufRead, Write};

const HELP: &[(&str, &str)] = &[
    ("#talk <name>", "Question someone else"),
    ("#actors", "List everyone in the case"),
    ("#evidence", "List the evidence you hold"),
    ("#present <id>", "Show an item to the current actor"),
    ("#map", "List the places you can investigate"),
    ("#investigate <place>", "Search a place on the map"),
    ("#notes", "Show your notes"),
    ("#note <text>", "Write a new note"),
    ("#accuse", "Name the culprit"),
    ("#answer <n>", "Pick an option during the accusation"),
    ("#submit", "Submit your accusation"),
    ("#back", "Withdraw from the accusation"),
    ("#status", "Show the game status"),
    ("#save", "Save progress"),
    ("#reset", "Start the case over"),
    ("#quit", "Exit the game"),
];

/// Run the game until stdin closes or the player quits.
pub async fn run(config: HeadlessConfig) -> Result<(), SessionError> {
    let mut game = HeadlessGame::new(config).await?;

    println!("=== Mystery ===");
    println!("{}", game.session().data().global_story);
    println!();
    println!("[STATUS] {}", game.status());
    println!("Type #help for commands. Anything else is said aloud.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let (name, rest) = command
                .split_once(char::is_whitespace)
                .map_or((command, ""), |(n, r)| (n, r.trim()));
            match name {
                "quit" | "exit" => {
                    println!("Goodbye!");
                    break;
                }
                _ => {
                    if let Err(e) = run_command(&mut game, name, rest).await {
                        println!("[ERROR] {e}");
                    }
                }
            }
        } else {
            print!("[THINKING] {}...", game.session().thinking_caption());
            stdout.flush().ok();
            let result = game.send(line).await;
            print!("\r{}\r", " ".repeat(40));
            stdout.flush().ok();
            match result {
                Ok(reply) => print_line(&game, &reply),
                Err(e) => println!("[ERROR] {e}"),
            }
        }

        print_notices(&mut game);
        stdout.flush().ok();
    }

    Ok(())
}

async fn run_command(game: &mut HeadlessGame, name: &str, arg: &str) -> Result<(), SessionError> {
    match name {
        "help" => {
            println!("[HELP]");
            for (command, text) in HELP {
                println!("  {command:<22} - {text}");
            }
            println!("  (anything else is said to the current actor)");
        }
        "talk" => {
            game.talk_to(arg)?;
            println!("[STATUS] {}", game.status());
            if let Some(last) = game.last_response() {
                print_line(game, last);
            }
        }
        "actors" => {
            let current = game.session().current_actor_id();
            for actor in game.session().actors() {
                let marker = if actor.id == current { "*" } else { " " };
                println!("{marker} {} - {}", actor.name, actor.bio);
            }
        }
        "evidence" => {
            let obtained = game.session().evidence().list_obtained();
            if obtained.is_empty() {
                println!("[EVIDENCE] none yet");
            }
            for item in obtained {
                println!("[EVIDENCE] {} {} - {}", item.id, item.name, item.description);
            }
        }
        "present" => {
            if arg.is_empty() {
                println!("[ERROR] Usage: #present <id>");
                return Ok(());
            }
            let outcome = game.present(arg)?;
            match outcome.reply {
                Some(reply) => print_line(game, &reply),
                None => println!("[SILENCE] No reaction."),
            }
        }
        "map" => {
            for page in &game.session().data().map.pages {
                print_map_page(page);
            }
        }
        "investigate" => {
            let outcome = game.investigate(arg)?;
            print_line(game, &outcome.message);
        }
        "notes" => {
            for note in game.session().notes().notes() {
                println!("[NOTE {}] {}", note.id, note.content);
            }
        }
        "note" => {
            let session = game.session_mut();
            let id = session.add_note();
            session.update_note(id, arg);
            println!("[NOTE {id}] {arg}");
        }
        "accuse" => {
            game.session_mut().enter_end_game()?;
            print_question(game);
        }
        "answer" => {
            let Some(choice) = arg.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
                println!("[ERROR] Usage: #answer <n>");
                return Ok(());
            };
            game.session_mut().choose_answer(choice)?;
            print_question(game);
        }
        "submit" => match game.session_mut().submit_accusation().await? {
            Some(DialogueOutcome::Replied { text, .. }) => print_line(game, &text),
            Some(DialogueOutcome::Failed { message }) => println!("[ERROR] {message}"),
            Some(DialogueOutcome::Cancelled) | None => println!("[END] The case is closed."),
        },
        "back" => {
            game.session_mut().resume_game()?;
            println!("[STATUS] {}", game.status());
        }
        "status" => println!("[STATUS] {}", game.status()),
        "save" => {
            game.save()?;
            println!("[SAVED]");
        }
        "reset" => {
            game.session_mut().reset()?;
            println!("[RESET] {}", game.status());
        }
        _ => println!("[ERROR] Unknown command. Type #help for help."),
    }
    Ok(())
}

fn print_line(game: &HeadlessGame, text: &str) {
    let speaker = game
        .session()
        .current_actor()
        .map_or_else(|| "???".to_string(), |a| a.name.to_uppercase());
    println!("[{speaker}]");
    for para in text.split("\n\n") {
        println!("{para}");
    }
    println!();
}

fn print_map_page(page: &MapPage) {
    println!("[MAP {}]", page.id);
    for region in page.regions.regions() {
        if let MapAction::Investigate { .. } = region.action {
            println!("  {}", region.name);
        }
    }
}

fn print_question(game: &HeadlessGame) {
    let session = game.session();
    let config = &session.data().accusation;
    match session.accusation().current(config) {
        Some((index, question)) => {
            println!("[QUESTION {}] {}", index + 1, question.prompt);
            for (i, option) in question.options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
        None => println!("[ACCUSE] Ready. Type #submit to name the culprit."),
    }
}

fn print_notices(game: &mut HeadlessGame) {
    for notice in game.take_notices() {
        match notice {
            Notice::EvidenceObtained { id, .. } => {
                let name = game
                    .session()
                    .evidence()
                    .get(&id)
                    .map_or(id.clone(), |item| item.name.clone());
                println!("[EVIDENCE] Obtained {id} {name}");
            }
            Notice::TestimonyUpdated { actor } => {
                let name = game.session().actor(actor).map_or("", |a| a.name.as_str());
                println!("[TESTIMONY] {name} has more to say");
            }
        }
    }
}
