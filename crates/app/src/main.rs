use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::num::NonZeroUsize;
use std::sync::Arc;

use backend::{HttpBackend, InMemoryBackend, TestBank};
use drill_core::model::{
    ChoiceLetter, GroupId, InteractiveQuestion, Question, QuestionId, QuestionKind, Selection,
};
use engine::{
    CompletionDisposition, CompletionMessage, FeedbackTone, InteractiveSurface, MoreOutcome,
    Notice, PracticeFlow, PracticeView, QuestionView, QuizFlow, QuizView, SurfaceError,
};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingTopic,
    UnknownArg(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingTopic => write!(f, "a topic is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Quiz,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "quiz" => Some(Self::Quiz),
            _ => None,
        }
    }
}

struct Args {
    topic: String,
    base_url: Option<String>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- practice [<topic>] [--base-url <url>]");
    eprintln!("  cargo run -p app -- quiz     [<topic>] [--base-url <url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  topic: ospf (the built-in sample bank)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DRILL_BASE_URL   use a remote collaborator instead of the sample bank");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut topic = None;
        let mut base_url = std::env::var("DRILL_BASE_URL").ok();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--base-url" => base_url = Some(require_value(args, "--base-url")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if other.starts_with("--") => {
                    return Err(ArgsError::UnknownArg(arg));
                }
                _ if topic.is_none() => topic = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let topic = match topic {
            Some(t) if t.trim().is_empty() => return Err(ArgsError::MissingTopic),
            Some(t) => t,
            None => "ospf".to_string(),
        };
        Ok(Self { topic, base_url })
    }
}

// ─── Sample bank ───────────────────────────────────────────────────────────────

fn choices(pairs: &[(char, &str)]) -> BTreeMap<ChoiceLetter, String> {
    pairs
        .iter()
        .filter_map(|(ch, text)| {
            ChoiceLetter::new(*ch)
                .ok()
                .map(|letter| (letter, (*text).to_string()))
        })
        .collect()
}

fn sample_bank() -> Result<TestBank, drill_core::model::QuestionError> {
    let q1 = Question::new(
        QuestionId::new("ospf-metric"),
        "Which value does OSPF use to pick the best path?",
        choices(&[
            ('a', "Hop count"),
            ('b', "Cost, derived from interface bandwidth"),
            ('c', "Delay"),
            ('d', "Administrative distance"),
        ]),
        QuestionKind::Single,
        0,
    )?;
    let q2 = Question::new(
        QuestionId::new("ospf-multicast"),
        "Which two multicast addresses does OSPF use? (Choose two.)",
        choices(&[
            ('a', "224.0.0.5"),
            ('b', "224.0.0.9"),
            ('c', "224.0.0.6"),
            ('d', "224.0.0.10"),
        ]),
        QuestionKind::Multi {
            required: NonZeroUsize::new(2),
        },
        0,
    )?;
    let q3 = Question::new(
        QuestionId::new("ospf-hello"),
        "What is the default OSPF hello interval on broadcast networks?",
        choices(&[
            ('a', "5 seconds"),
            ('b', "30 seconds"),
            ('c', "10 seconds"),
            ('d', "40 seconds"),
        ]),
        QuestionKind::Single,
        0,
    )?;
    let q4 = Question::new(
        QuestionId::new("ospf-metric-alt"),
        "An interface's OSPF cost is computed from which property?",
        choices(&[
            ('a', "Its MTU"),
            ('b', "Its bandwidth"),
            ('c', "Its queue depth"),
            ('d', "Its MAC address"),
        ]),
        QuestionKind::Single,
        0,
    )?;
    let dd1 = Question::new(
        QuestionId::new("ospf-states"),
        "Arrange the OSPF neighbor states in order.",
        BTreeMap::new(),
        QuestionKind::Interactive,
        0,
    )?;

    let bank = TestBank::new("ospf", "OSPF")
        .with_question(q1, "b")
        .with_question(q2, "a,c")
        .with_question(q3, "c")
        .with_question(q4, "b")
        .with_question(dd1, "-")
        .with_group(
            GroupId::new("g-metric"),
            "OSPF path selection",
            vec![
                QuestionId::new("ospf-metric"),
                QuestionId::new("ospf-metric-alt"),
            ],
        )
        .with_group(
            GroupId::new("g-timers"),
            "OSPF timers",
            vec![QuestionId::new("ospf-hello")],
        )
        .with_group(
            GroupId::new("g-states"),
            "OSPF neighbor states",
            vec![QuestionId::new("ospf-states")],
        )
        .with_interactive(InteractiveQuestion {
            id: QuestionId::new("ospf-states"),
            title: "OSPF neighbor states".to_string(),
            instructions: "Drag the states into the order a neighbor moves through them."
                .to_string(),
        });
    Ok(bank)
}

// ─── Rendering ─────────────────────────────────────────────────────────────────

fn render(view: &QuestionView, selection: &Selection) {
    println!();
    println!("Question {} of {}", view.position, view.total);
    println!("{}", view.text);
    if let Some(required) = view.multi_hint {
        println!("(choose {required})");
    }
    for row in &view.choices {
        let mark = if is_selected(selection, row.letter) {
            "x"
        } else {
            " "
        };
        if row.struck {
            println!("  [{mark}] {}. {}  (ruled out)", row.letter, row.text);
        } else {
            println!("  [{mark}] {}. {}", row.letter, row.text);
        }
    }
    if view.interactive {
        println!("  (interactive activity: type 'open' to launch it)");
    }
    if let Some(feedback) = &view.feedback {
        let label = match feedback.tone {
            FeedbackTone::Correct => "Correct!",
            FeedbackTone::Incorrect => "Incorrect.",
            FeedbackTone::Revealed => "Answer revealed.",
        };
        println!();
        println!("{label} {}", feedback.message);
        if let Some(answer) = &feedback.answer_text {
            println!("The correct answer is: {answer}");
        }
    }
    match &view.notice {
        Some(Notice::Info(message)) => println!("* {message}"),
        Some(Notice::Danger(message)) => println!("! {message}"),
        None => {}
    }

    let mut actions = Vec::new();
    if view.actions.can_submit {
        actions.push("letters to select, 'go' to submit");
    }
    if view.actions.can_retry {
        actions.push("'retry'");
    }
    if view.actions.can_reveal {
        actions.push("'reveal'");
    }
    if view.actions.can_skip {
        actions.push("'skip'");
    }
    if view.actions.can_advance {
        actions.push("'next'");
    }
    if view.actions.can_request_more {
        actions.push("'more' for another question on this concept");
    }
    actions.push("'quit'");
    println!("[{}]", actions.join(", "));
}

fn is_selected(selection: &Selection, letter: ChoiceLetter) -> bool {
    match selection {
        Selection::Single(current) => *current == Some(letter),
        Selection::Multi(set) => set.contains(&letter),
    }
}

fn prompt() -> io::Result<Option<String>> {
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_lowercase()))
}

// ─── Practice mode ─────────────────────────────────────────────────────────────

async fn run_practice(mut flow: PracticeFlow, topic: &str) -> Result<(), Box<dyn std::error::Error>> {
    flow.start(topic).await?;
    let session = flow.session().ok_or("session missing after start")?;
    println!(
        "Practicing {}: {} questions. Good luck!",
        session.topic_name(),
        session.total_questions()
    );

    let mut selection = Selection::Single(None);
    let mut at_position = 0;
    loop {
        let view = match flow.view()? {
            PracticeView::Summary(summary) => {
                print_summary(&summary);
                return Ok(());
            }
            PracticeView::Question(view) => view,
        };
        if view.position != at_position {
            at_position = view.position;
            selection = match flow.session().and_then(|s| s.current_question()) {
                Some(question) => Selection::none_for(question),
                None => Selection::Single(None),
            };
        }
        render(&view, &selection);

        let Some(input) = prompt()? else {
            return Ok(());
        };
        let outcome = match input.as_str() {
            "quit" | "q" => return Ok(()),
            "go" | "submit" => flow.submit(&selection).await,
            "retry" => flow.retry(),
            "reveal" => flow.reveal().await,
            "skip" => flow.skip().await,
            "next" | "" => flow.next().await,
            other => {
                match other.parse::<ChoiceLetter>() {
                    Ok(letter) => selection.toggle(letter),
                    Err(_) => println!("Unrecognized input: {other}"),
                }
                Ok(())
            }
        };
        if let Err(err) = outcome {
            println!("{err}");
        }
    }
}

fn print_summary(summary: &drill_core::model::PracticeSummary) {
    println!();
    println!("Session complete!");
    println!(
        "Answered {} of {} ({} correct, {} incorrect, {} skipped) - {}%",
        summary.answered(),
        summary.total_questions(),
        summary.correct(),
        summary.incorrect(),
        summary.skipped(),
        summary.percentage()
    );
    if !summary.missed().is_empty() {
        println!("Worth revisiting:");
        for missed in summary.missed() {
            println!("  - {} ({} attempts)", missed.question_text, missed.attempts);
        }
    }
}

// ─── Quiz mode ─────────────────────────────────────────────────────────────────

/// Renders the activity inline; the completion report is typed back in.
#[derive(Default)]
struct TerminalSurface {
    open_question: Option<QuestionId>,
}

impl InteractiveSurface for TerminalSurface {
    fn open(&mut self, question: &Question) -> Result<(), SurfaceError> {
        if self.open_question.take().is_some() {
            println!("(previous activity closed)");
        }
        println!();
        println!("--- Activity: {} ---", question.text());
        println!("(solve it, then report the result)");
        self.open_question = Some(question.id().clone());
        Ok(())
    }

    fn close(&mut self) {
        self.open_question = None;
    }
}

async fn run_quiz(mut flow: QuizFlow, topic: &str) -> Result<(), Box<dyn std::error::Error>> {
    flow.start(topic).await?;
    let session = flow.session().ok_or("session missing after start")?;
    println!(
        "Quiz on {}: {} concepts, one question each.",
        session.topic(),
        session.group_count()
    );

    let mut surface = TerminalSurface::default();
    let mut selection = Selection::Single(None);
    let mut at_question: Option<QuestionId> = None;
    loop {
        let view = match flow.view()? {
            QuizView::Finished(report) => {
                print_report(&report);
                return Ok(());
            }
            QuizView::Question(view) => view,
        };
        let current_id = flow
            .session()
            .and_then(|s| s.current_group())
            .map(|g| g.question().id().clone());
        if current_id != at_question {
            at_question = current_id.clone();
            selection = match flow.session().and_then(|s| s.current_group()) {
                Some(group) => Selection::none_for(group.question()),
                None => Selection::Single(None),
            };
        }
        render(&view, &selection);

        let Some(input) = prompt()? else {
            return Ok(());
        };
        let outcome = match input.as_str() {
            "quit" | "q" => return Ok(()),
            "go" | "submit" => flow.submit(&selection).await,
            "retry" => flow.retry(),
            "reveal" => flow.reveal().await,
            "more" => flow.more_from_group().await.map(|outcome| {
                if outcome == MoreOutcome::Exhausted {
                    println!("That concept is fully covered; moving on.");
                }
            }),
            "next" | "skip" | "" => flow.next_group(),
            "open" => match flow.open_interactive(&mut surface) {
                Ok(()) => {
                    report_activity(&mut flow, &mut surface, current_id.as_ref())?;
                    Ok(())
                }
                Err(err) => Err(err),
            },
            other => {
                match other.parse::<ChoiceLetter>() {
                    Ok(letter) => selection.toggle(letter),
                    Err(_) => println!("Unrecognized input: {other}"),
                }
                Ok(())
            }
        };
        if let Err(err) = outcome {
            println!("{err}");
        }
    }
}

/// Asks for the activity result and feeds it back as a completion
/// message, the same path a real secondary context uses.
fn report_activity(
    flow: &mut QuizFlow,
    surface: &mut TerminalSurface,
    question_id: Option<&QuestionId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(question_id) = question_id else {
        return Ok(());
    };
    println!("Did you place everything correctly? (y/n, anything else to leave it open)");
    let Some(input) = prompt()? else {
        return Ok(());
    };
    let correct = match input.as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => return Ok(()),
    };
    let message = CompletionMessage::new(question_id.clone(), true, correct);
    match flow.handle_completion(&message, surface)? {
        CompletionDisposition::Resolved => println!("Nice work."),
        CompletionDisposition::RetryOffered => {
            println!("No luck this time; 'open' tries again.");
        }
        CompletionDisposition::Ignored => {}
    }
    Ok(())
}

fn print_report(report: &drill_core::model::QuizReport) {
    println!();
    println!("Quiz complete!");
    println!(
        "{} of {} concepts right on the first try ({:.0}%).",
        report.first_attempt_correct(),
        report.resolved(),
        report.first_attempt_accuracy() * 100.0
    );
    if !report.strong().is_empty() {
        println!("Strong concepts:");
        for result in report.strong() {
            println!("  + {}", result.concept);
        }
    }
    if !report.weak().is_empty() {
        println!("Review these concepts:");
        for result in report.weak() {
            println!("  - {} ({} attempts)", result.concept, result.attempts);
        }
    }
}

// ─── Entry point ───────────────────────────────────────────────────────────────

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Practice,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Practice,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && Command::from_arg(&argv[0]).is_some() {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match (&args.base_url, cmd) {
        (Some(base_url), Command::Practice) => {
            log::info!("using remote collaborator at {base_url}");
            run_practice(PracticeFlow::new(Arc::new(HttpBackend::new(base_url))), &args.topic).await
        }
        (Some(base_url), Command::Quiz) => {
            log::info!("using remote collaborator at {base_url}");
            run_quiz(QuizFlow::new(Arc::new(HttpBackend::new(base_url))), &args.topic).await
        }
        (None, Command::Practice) => {
            let backend = Arc::new(InMemoryBackend::new(sample_bank()?).with_shuffle(true));
            run_practice(PracticeFlow::new(backend), &args.topic).await
        }
        (None, Command::Quiz) => {
            let backend = Arc::new(InMemoryBackend::new(sample_bank()?).with_shuffle(true));
            run_quiz(QuizFlow::new(backend), &args.topic).await
        }
    }
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
