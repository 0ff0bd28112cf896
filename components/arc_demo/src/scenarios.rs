//! The ARC walkthrough scenarios.
//!
//! Each scenario builds a small object graph on the memory manager, drops
//! its handles, and records what the finalizers printed along the way.

use clap::ValueEnum;
use core_types::config;
use memory_manager::{
    stats, CaptureKind, Captured, Closure, HeapStats, LazyClosure, Strong, Unowned,
    UnownedOptional, Weak,
};
use serde::Serialize;
use std::cell::RefCell;

use crate::error::{DemoError, DemoResult};
use crate::transcript::Transcript;

/// A runnable scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Three strong references to one person
    Basic,
    /// Resident and apartment owning each other (leaks)
    Cycle,
    /// Apartment observing its tenant weakly
    Weak,
    /// Credit card holding its customer unowned
    Unowned,
    /// Course holding an optional unowned department
    UnownedOptional,
    /// HTML element storing a closure that captures it
    Closure,
    /// Every scenario above, in order
    All,
}

impl Scenario {
    /// The individual scenarios, in the order `All` runs them.
    pub const EACH: [Scenario; 6] = [
        Scenario::Basic,
        Scenario::Cycle,
        Scenario::Weak,
        Scenario::Unowned,
        Scenario::UnownedOptional,
        Scenario::Closure,
    ];

    /// Returns the command-line name.
    pub fn name(self) -> &'static str {
        match self {
            Scenario::Basic => "basic",
            Scenario::Cycle => "cycle",
            Scenario::Weak => "weak",
            Scenario::Unowned => "unowned",
            Scenario::UnownedOptional => "unowned-optional",
            Scenario::Closure => "closure",
            Scenario::All => "all",
        }
    }

    /// Instances the scenario leaks on purpose.
    pub fn expected_leaks(self) -> u64 {
        match self {
            Scenario::Cycle => 2,
            Scenario::Closure => 1,
            Scenario::All => Scenario::EACH.iter().map(|s| s.expected_leaks()).sum(),
            _ => 0,
        }
    }

    fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => Scenario::EACH.to_vec(),
            single => vec![single],
        }
    }
}

/// What one scenario printed and how the heap moved while it ran.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario that produced this report
    pub scenario: Scenario,
    /// Output lines, finalizer messages included
    pub lines: Vec<String>,
    /// Counter deltas over the scenario
    pub stats: HeapStats,
}

/// Runs `scenario`, expanding `All` into one report per scenario.
pub fn run(scenario: Scenario) -> DemoResult<Vec<ScenarioReport>> {
    scenario.expand().into_iter().map(run_single).collect()
}

/// Runs every scenario.
pub fn run_all() -> DemoResult<Vec<ScenarioReport>> {
    run(Scenario::All)
}

/// Runs one concrete scenario. `All` must be expanded by the caller.
fn run_single(scenario: Scenario) -> DemoResult<ScenarioReport> {
    log::debug!("running scenario `{}`", scenario.name());
    let before = stats::snapshot();
    let out = Transcript::new();

    match scenario {
        Scenario::Basic => basic(&out)?,
        Scenario::Cycle => cycle(&out)?,
        Scenario::Weak => weak_tenant(&out)?,
        Scenario::Unowned => unowned_customer(&out)?,
        Scenario::UnownedOptional => unowned_department(&out)?,
        Scenario::Closure => closure_capture(&out)?,
        Scenario::All => unreachable!("`all` is expanded before running"),
    }

    let delta = stats::snapshot().since(&before);
    if config::current().track_stats && delta.live_instances() != scenario.expected_leaks() {
        return Err(DemoError::UnexpectedLiveInstances {
            scenario: scenario.name(),
            expected: scenario.expected_leaks(),
            actual: delta.live_instances(),
        });
    }

    Ok(ScenarioReport {
        scenario,
        lines: out.lines(),
        stats: delta,
    })
}

// ============================================================================
// Basic ownership
// ============================================================================

struct Person {
    name: String,
}

fn basic(out: &Transcript) -> DemoResult<()> {
    out.say("--- Basic ARC in Action ---");
    let name = "John Appleseed";
    let reference1 = Strong::with_finalizer(
        Person {
            name: name.to_string(),
        },
        out.on_finalize(format!("{name} is being deinitialized (Person).")),
    );
    out.say(format!("{} is being initialized (Person).", reference1.name));

    let reference2 = reference1.clone();
    let reference3 = reference1.clone();
    out.say(format!(
        "{} strong references to {}.",
        Strong::strong_count(&reference1),
        reference3.name
    ));

    drop(reference1);
    drop(reference2);
    out.say("reference1 and reference2 are nil. reference3 still holds a reference.");

    drop(reference3);
    Ok(())
}

// ============================================================================
// Strong reference cycle
// ============================================================================

struct Resident {
    name: String,
    apartment: RefCell<Option<Strong<Apartment>>>,
}

struct Apartment {
    unit: String,
    tenant: RefCell<Option<Strong<Resident>>>,
}

fn cycle(out: &Transcript) -> DemoResult<()> {
    out.say("--- Strong Reference Cycle Example ---");
    let bob = Strong::with_finalizer(
        Resident {
            name: "Bob".to_string(),
            apartment: RefCell::new(None),
        },
        out.on_finalize("Resident Bob deinitialized."),
    );
    out.say(format!("Resident {} initialized.", bob.name));
    let unit4a = Strong::with_finalizer(
        Apartment {
            unit: "4A".to_string(),
            tenant: RefCell::new(None),
        },
        out.on_finalize("Apartment 4A deinitialized."),
    );
    out.say(format!("Apartment {} initialized.", unit4a.unit));

    *bob.apartment.borrow_mut() = Some(unit4a.clone());
    *unit4a.tenant.borrow_mut() = Some(bob.clone());
    out.say("bob and unit4A are linked, creating a cycle.");

    let bob_observer = Strong::downgrade(&bob);
    let unit_observer = Strong::downgrade(&unit4a);
    drop(bob);
    drop(unit4a);
    out.say(format!(
        "bob and unit4A are nil, but Bob still has {} and 4A still has {} strong reference(s).",
        bob_observer.strong_count(),
        unit_observer.strong_count()
    ));
    out.say("Neither deinitializer ran: the pair is leaked.");
    Ok(())
}

// ============================================================================
// Weak back edge
// ============================================================================

struct Occupant {
    name: String,
    apartment: RefCell<Option<Strong<Flat>>>,
}

struct Flat {
    unit: String,
    tenant: RefCell<Option<Weak<Occupant>>>,
}

fn weak_tenant(out: &Transcript) -> DemoResult<()> {
    out.say("--- Weak Reference Example (Resolving Cycle) ---");
    let alice = Strong::with_finalizer(
        Occupant {
            name: "Alice".to_string(),
            apartment: RefCell::new(None),
        },
        out.on_finalize("Occupant Alice deinitialized."),
    );
    out.say(format!("Occupant {} initialized.", alice.name));
    let unit1b = Strong::with_finalizer(
        Flat {
            unit: "1B".to_string(),
            tenant: RefCell::new(None),
        },
        out.on_finalize("Flat 1B deinitialized."),
    );
    out.say(format!("Flat {} initialized.", unit1b.unit));

    *alice.apartment.borrow_mut() = Some(unit1b.clone());
    *unit1b.tenant.borrow_mut() = Some(Strong::downgrade(&alice));
    out.say("Alice and unit1B are linked (using weak for tenant).");

    drop(alice);
    let tenant = unit1b
        .tenant
        .borrow()
        .as_ref()
        .and_then(|weak| weak.read())
        .map(|occupant| occupant.name.clone());
    match tenant {
        Some(name) => out.say(format!("Flat {} tenant is still {name}.", unit1b.unit)),
        None => out.say(format!("Flat {} tenant is now nil.", unit1b.unit)),
    }

    drop(unit1b);
    Ok(())
}

// ============================================================================
// Unowned back edge
// ============================================================================

struct Customer {
    name: String,
    card: RefCell<Option<Strong<CreditCard>>>,
}

struct CreditCard {
    number: u64,
    customer: Unowned<Customer>,
}

fn unowned_customer(out: &Transcript) -> DemoResult<()> {
    out.say("--- Unowned Reference Example ---");
    let david = Strong::with_finalizer(
        Customer {
            name: "David".to_string(),
            card: RefCell::new(None),
        },
        out.on_finalize("Customer David deinitialized."),
    );
    out.say(format!("Customer {} initialized.", david.name));

    let number = 1_234_567_890_123_456;
    let card = Strong::with_finalizer(
        CreditCard {
            number,
            customer: Strong::unowned(&david),
        },
        out.on_finalize(format!("CreditCard #{number} deinitialized.")),
    );
    out.say(format!(
        "CreditCard #{} for {} initialized.",
        card.number,
        card.customer.try_read()?.name
    ));
    *david.card.borrow_mut() = Some(card);

    let stale = Strong::unowned(&david);
    drop(david);
    match stale.try_read() {
        Ok(customer) => out.say(format!("Customer {} is still alive.", customer.name)),
        Err(err) => out.say(format!("Reading the unowned customer now would trap: {err}")),
    }
    Ok(())
}

// ============================================================================
// Unowned optional
// ============================================================================

struct Department {
    name: String,
}

struct Course {
    title: String,
    department: RefCell<UnownedOptional<Department>>,
}

fn department(out: &Transcript, name: &str) -> Strong<Department> {
    let department = Strong::with_finalizer(
        Department {
            name: name.to_string(),
        },
        out.on_finalize(format!("Department {name} deallocated.")),
    );
    out.say(format!("Department {name} created."));
    department
}

fn describe_department(out: &Transcript, course: &Course) -> DemoResult<()> {
    match course.department.borrow().try_get()? {
        Some(department) => out.say(format!(
            "{} is offered by {}.",
            course.title, department.name
        )),
        None => out.say(format!("{} has no department.", course.title)),
    }
    Ok(())
}

fn unowned_department(out: &Transcript) -> DemoResult<()> {
    out.say("--- Unowned Optional Reference Example ---");
    let comp_sci = department(out, "Computer Science");
    let intro = Strong::with_finalizer(
        Course {
            title: "Intro to Programming".to_string(),
            department: RefCell::new(UnownedOptional::unset()),
        },
        out.on_finalize("Course Intro to Programming deallocated."),
    );
    out.say(format!("Course {} created.", intro.title));
    describe_department(out, &intro)?;

    intro.department.borrow_mut().set(Some(&comp_sci));
    describe_department(out, &intro)?;

    out.say("Deallocating Computer Science department...");
    drop(comp_sci);
    if let Err(err) = intro.department.borrow().try_get() {
        out.say(format!("Reading the department now would trap: {err}"));
    }
    intro.department.borrow_mut().clear();
    describe_department(out, &intro)?;

    let math = department(out, "Math");
    intro.department.borrow_mut().set(Some(&math));
    describe_department(out, &intro)?;
    out.say("Deallocating Math department...");
    intro.department.borrow_mut().clear();
    drop(math);

    drop(intro);
    Ok(())
}

// ============================================================================
// Closure capture lists
// ============================================================================

struct HtmlElement {
    name: String,
    text: Option<String>,
    as_html: LazyClosure<Captured<HtmlElement>, String>,
}

fn render(element: Option<Strong<HtmlElement>>) -> String {
    match element {
        Some(element) => match &element.text {
            Some(text) => format!("<{0}>{1}</{0}>", element.name, text),
            None => format!("<{} />", element.name),
        },
        None => "<!-- deallocated element -->".to_string(),
    }
}

fn html_element(out: &Transcript, name: &str, text: Option<&str>) -> Strong<HtmlElement> {
    let element = Strong::with_finalizer(
        HtmlElement {
            name: name.to_string(),
            text: text.map(str::to_string),
            as_html: LazyClosure::new(),
        },
        out.on_finalize(format!("HtmlElement {name} deinitialized.")),
    );
    out.say(format!("HtmlElement {name} initialized."));
    element
}

fn closure_capture(out: &Transcript) -> DemoResult<()> {
    out.say("--- Strong Reference Cycle with Closure ---");
    let paragraph = html_element(out, "p", Some("hello, world"));
    let as_html = paragraph
        .as_html
        .get_or_init(|| Closure::new(Captured::bind(&paragraph, CaptureKind::Strong), render));
    out.say(as_html.call());
    drop(as_html);
    let observer = Strong::downgrade(&paragraph);
    drop(paragraph);
    out.say(format!(
        "paragraph is nil, but its closure still holds {} strong reference: leaked.",
        observer.strong_count()
    ));

    out.say("--- Capture list [weak self] ---");
    let heading = html_element(out, "h1", Some("Welcome"));
    let as_html = heading
        .as_html
        .get_or_init(|| Closure::new(Captured::weak(&heading), render));
    out.say(as_html.call());
    drop(heading);
    out.say(as_html.call());

    out.say("--- Capture list [unowned self] ---");
    let div = html_element(out, "div", None);
    let as_html = div
        .as_html
        .get_or_init(|| Closure::new(Captured::unowned(&div), render));
    out.say(as_html.call());
    drop(as_html);
    drop(div);
    Ok(())
}
