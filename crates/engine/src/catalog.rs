//! Built-in registration scenario suite
//!
//! Covers the registration form of a demo web shop: page access, valid
//! registrations, each missing required field, password mismatch, malformed
//! emails and duplicate accounts. Negative scenarios pass when the site
//! rejects the submission and keeps the user on the form.

use crate::config::DEFAULT_ERROR_SELECTOR;
use crate::scenario::{ElementRef, Expectation, Scenario, Step};

const PASSWORD: &str = "Test@1234";
const SUCCESS_TEXT: &str = "Your registration completed";

/// Form fields a registration scenario can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FirstName,
    LastName,
    Email,
    Password,
    ConfirmPassword,
}

impl Field {
    fn target(self) -> ElementRef {
        match self {
            Field::FirstName => ElementRef::new("textbox", "First name:"),
            Field::LastName => ElementRef::new("textbox", "Last name:"),
            Field::Email => ElementRef::new("textbox", "Email:"),
            Field::Password => ElementRef::exact("textbox", "Password:"),
            Field::ConfirmPassword => ElementRef::new("textbox", "Confirm password:"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Gender {
    Male,
    Female,
}

impl Gender {
    fn radio(self) -> ElementRef {
        match self {
            Gender::Male => ElementRef::exact("radio", "Male"),
            Gender::Female => ElementRef::exact("radio", "Female"),
        }
    }
}

/// Values for one form submission. `None` leaves the field untouched.
struct Submission<'a> {
    gender: Gender,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    email: Option<&'a str>,
    password: Option<&'a str>,
    confirm_password: Option<&'a str>,
}

impl<'a> Submission<'a> {
    fn complete(gender: Gender, first_name: &'a str, last_name: &'a str) -> Self {
        Self {
            gender,
            first_name: Some(first_name),
            last_name: Some(last_name),
            email: Some("${email}"),
            password: Some(PASSWORD),
            confirm_password: Some(PASSWORD),
        }
    }

    fn without(mut self, field: Field) -> Self {
        match field {
            Field::FirstName => self.first_name = None,
            Field::LastName => self.last_name = None,
            Field::Email => self.email = None,
            Field::Password => self.password = None,
            Field::ConfirmPassword => self.confirm_password = None,
        }
        self
    }

    fn email(mut self, email: &'a str) -> Self {
        self.email = Some(email);
        self
    }

    fn passwords(mut self, password: &'a str, confirm: &'a str) -> Self {
        self.password = Some(password);
        self.confirm_password = Some(confirm);
        self
    }

    fn steps(&self, register_url: &str) -> Vec<Step> {
        let mut steps = vec![
            Step::navigate(register_url),
            Step::click(self.gender.radio()),
        ];

        let fields = [
            (Field::FirstName, self.first_name),
            (Field::LastName, self.last_name),
            (Field::Email, self.email),
            (Field::Password, self.password),
            (Field::ConfirmPassword, self.confirm_password),
        ];
        steps.extend(
            fields
                .into_iter()
                .filter_map(|(field, value)| value.map(|v| Step::fill(field.target(), v))),
        );

        steps.push(Step::click(register_button()));
        steps
    }
}

fn register_button() -> ElementRef {
    ElementRef::new("button", "Register")
}

/// The registration suite against `base_url`, using the default error selector.
pub fn registration_suite(base_url: &str) -> Vec<Scenario> {
    registration_suite_with(base_url, DEFAULT_ERROR_SELECTOR)
}

/// The registration suite against `base_url`, detecting validation errors
/// with `error_selector`.
pub fn registration_suite_with(base_url: &str, error_selector: &str) -> Vec<Scenario> {
    let register_url = format!("{}/register", base_url.trim_end_matches('/'));
    let url = register_url.as_str();
    let rejected = |scenario: Scenario| expect_rejected(scenario, error_selector);

    vec![
        access_page(url),
        expect_registered(
            Scenario::new("valid-registration-male")
                .describe("Register a new account with valid details")
                .bind_unique("email", "johndoe.test", "@example.com")
                .steps(Submission::complete(Gender::Male, "John", "Doe").steps(url)),
        )
        .expect(Expectation::not_visible(ElementRef::pattern("link", "^Register$"))),
        expect_registered(
            Scenario::new("valid-registration-female")
                .describe("Register with the female gender option")
                .bind_unique("email", "janesmith.test", "@example.com")
                .steps(
                    Submission::complete(Gender::Female, "Jane", "Smith")
                        .passwords("SecurePass@123", "SecurePass@123")
                        .steps(url),
                ),
        ),
        Scenario::new("special-characters-in-names")
            .describe("Hyphens and apostrophes in names are accepted")
            .tag("registration")
            .tag("positive")
            .bind_unique("email", "testuser", "@example.com")
            .steps(Submission::complete(Gender::Male, "Jean-Pierre", "O'Brien").steps(url))
            .expect(Expectation::text_present(SUCCESS_TEXT)),
        rejected(missing("missing-first-name", Field::FirstName, url)),
        rejected(missing("missing-last-name", Field::LastName, url)),
        rejected(missing("missing-email", Field::Email, url)),
        rejected(missing("missing-password", Field::Password, url)),
        rejected(missing("missing-confirm-password", Field::ConfirmPassword, url)),
        rejected(
            Scenario::new("password-mismatch")
                .describe("Password and confirmation differ")
                .bind_unique("email", "testuser", "@example.com")
                .steps(
                    Submission::complete(Gender::Male, "John", "Doe")
                        .passwords(PASSWORD, "Test@5678")
                        .steps(url),
                ),
        ),
        rejected(
            Scenario::new("invalid-email-no-domain")
                .describe("Email without an @domain part is rejected")
                .steps(
                    Submission::complete(Gender::Male, "John", "Doe")
                        .email("invalidemail")
                        .steps(url),
                ),
        ),
        rejected(
            Scenario::new("invalid-email-no-tld")
                .describe("Email without a top-level domain is rejected")
                .steps(
                    Submission::complete(Gender::Female, "Jane", "Smith")
                        .email("test@invalid")
                        .steps(url),
                ),
        ),
        rejected(duplicate_email(url)),
    ]
}

fn access_page(url: &str) -> Scenario {
    let mut scenario = Scenario::new("access-registration-page")
        .describe("Registration form renders with every required field")
        .tag("registration")
        .tag("smoke")
        .step(Step::navigate(url))
        .expect(Expectation::visible(ElementRef::new("heading", "Register")))
        .expect(Expectation::visible(register_button()))
        .expect(Expectation::text_present("Your Personal Details"))
        .expect(Expectation::text_present("Your Password"));

    for field in [
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::Password,
        Field::ConfirmPassword,
    ] {
        scenario = scenario.expect(Expectation::visible(field.target()));
    }
    scenario
}

fn missing(name: &str, field: Field, url: &str) -> Scenario {
    let scenario = Scenario::new(name).describe(format!("Submit with {:?} left empty", field));
    let scenario = if field == Field::Email {
        scenario
    } else {
        scenario.bind_unique("email", "testuser", "@example.com")
    };
    scenario.steps(
        Submission::complete(Gender::Male, "John", "Doe")
            .without(field)
            .steps(url),
    )
}

/// Register, log out, then register again with the same email.
///
/// The first registration is only confirmed by the `Log out` link it leaves
/// behind: if it is rejected, that click cannot resolve and the scenario ends
/// `Errored` rather than `Failed`.
fn duplicate_email(url: &str) -> Scenario {
    let first = Submission::complete(Gender::Male, "John", "Doe").steps(url);
    let second = Submission::complete(Gender::Female, "Jane", "Smith")
        .passwords("Password@123", "Password@123")
        .steps(url);

    Scenario::new("duplicate-email")
        .describe("A second account with an existing email is rejected (requires the first registration to succeed)")
        .bind_unique("email", "duplicate.test", "@example.com")
        .steps(first)
        .step(Step::click(ElementRef::new("link", "Log out")))
        .steps(second)
}

fn expect_registered(scenario: Scenario) -> Scenario {
    scenario
        .tag("registration")
        .tag("positive")
        .expect(Expectation::text_present(SUCCESS_TEXT))
        .expect(Expectation::visible(ElementRef::new("link", "${email}")))
}

fn expect_rejected(scenario: Scenario, error_selector: &str) -> Scenario {
    scenario
        .tag("registration")
        .tag("negative")
        .expect(Expectation::text_absent(SUCCESS_TEXT))
        .expect(Expectation::visible(ElementRef::new("heading", "Register")))
        .expect(Expectation::count_at_least(error_selector, 1))
}
