//! The scripted qualification dialogue.
//!
//! `evaluate` is pure: given the current step and the user's input it
//! decides whether to advance (and with which reply, captured fields, and
//! next step) or to re-prompt. The gateway applies the decision send-first:
//! state is committed only after the reply is delivered, so a failed send
//! leaves the contact exactly where it was.

use super::Gateway;
use leadflow_core::{
    contact::{Contact, LeadProfile, ProfileFields},
    error::LeadflowError,
    flow::FlowStep,
    traits::ButtonOption,
};
use tracing::{debug, info, warn};

/// Operator reset command, matched case- and whitespace-insensitively.
pub(super) const RESET_COMMAND: &str = "#reset";

const GREETING: &str = "Olá! 👋 Bem-vindo(a)! Sou o assistente virtual da nossa agência digital.\n\
                        Me conta: o que você está procurando?";
const ASK_SITE: &str = "Boa escolha! Você já tem um site hoje?";
const ASK_ONLINE: &str = "E hoje você já vende pela internet?";
const ASK_PRODUCTS: &str =
    "Quantos produtos ou serviços você pretende oferecer? Pode ser um número aproximado.";
const ASK_GOAL: &str = "Qual é o seu principal objetivo?";
const OFFER_PROMPT: &str = "Perfeito, já tenho tudo que preciso! Como prefere continuar?";
const CLOSING_CONFIRM: &str = "Fechado! 🎉 Recebemos suas respostas e nossa equipe \
                               vai falar com você em breve. Obrigado!";
const CLOSING_ACK: &str =
    "Já estamos com seus dados por aqui — nossa equipe entra em contato em breve. 😊";

const TRIAGE_INVALID: &str =
    "Não entendi 🤔 Responda com *1*, *2* ou *3* — site, loja virtual ou sistemas.";
const YES_NO_INVALID: &str = "Só para confirmar: responda *sim* ou *não*, por favor.";
const PRODUCTS_INVALID: &str = "Me passa um número, mesmo que aproximado — ex.: 50.";
const GOAL_INVALID: &str = "Responda *1* para agendamento ou *2* para venda direta.";
const OFFER_INVALID: &str = "Responda *1* para receber o PDF ou *2* para agendar uma reunião.";

pub(super) const RESET_ACK: &str =
    "Prontinho! Recomeçamos do zero. Mande qualquer mensagem para iniciar de novo. 🔄";
pub(super) const CORRUPTED_RESET: &str = "Tivemos um problema por aqui e sua conversa foi \
                                          reiniciada. Mande qualquer mensagem para continuar.";

/// Reply content for one step: plain text or a tappable menu.
#[derive(Debug, Clone)]
pub(super) enum Reply {
    Text(String),
    Buttons {
        body: String,
        options: Vec<ButtonOption>,
    },
}

impl Reply {
    /// The text persisted to the message log (buttons render platform-side).
    pub(super) fn body(&self) -> &str {
        match self {
            Self::Text(body) => body,
            Self::Buttons { body, .. } => body,
        }
    }
}

/// Outcome of validating one input against the current step.
#[derive(Debug)]
pub(super) enum StepDecision {
    Advance {
        next: FlowStep,
        fields: ProfileFields,
        reply: Reply,
    },
    Reject {
        prompt: &'static str,
    },
}

/// Validate `input` against `step` and pick the transition.
///
/// `FlowStep::AiChat` is not handled here — the pipeline routes it to the
/// generative responder instead of the script.
pub(super) fn evaluate(step: FlowStep, input: &str) -> StepDecision {
    match step {
        // Unconditional: the first inbound line exists to trigger the menu,
        // not to answer it.
        FlowStep::New => StepDecision::Advance {
            next: FlowStep::Triage,
            fields: ProfileFields::default(),
            reply: greeting_menu(),
        },

        FlowStep::Triage => match interest(input) {
            Some((value, base_score)) => StepDecision::Advance {
                next: FlowStep::QualifySite,
                fields: ProfileFields {
                    interest: Some(value.to_string()),
                    score_delta: base_score,
                    ..Default::default()
                },
                reply: yes_no_menu(ASK_SITE),
            },
            None => StepDecision::Reject {
                prompt: TRIAGE_INVALID,
            },
        },

        FlowStep::QualifySite => match yes_no(input) {
            Some(answer) => StepDecision::Advance {
                next: FlowStep::QualifyOnline,
                fields: ProfileFields {
                    has_site: Some(answer.to_string()),
                    score_delta: if answer == "sim" { 10 } else { 0 },
                    ..Default::default()
                },
                reply: yes_no_menu(ASK_ONLINE),
            },
            None => StepDecision::Reject {
                prompt: YES_NO_INVALID,
            },
        },

        FlowStep::QualifyOnline => match yes_no(input) {
            Some(answer) => StepDecision::Advance {
                next: FlowStep::QualifyProducts,
                fields: ProfileFields {
                    sells_online: Some(answer.to_string()),
                    score_delta: if answer == "sim" { 10 } else { 0 },
                    ..Default::default()
                },
                reply: Reply::Text(ASK_PRODUCTS.to_string()),
            },
            None => StepDecision::Reject {
                prompt: YES_NO_INVALID,
            },
        },

        FlowStep::QualifyProducts => match first_number(input) {
            Some(count) => StepDecision::Advance {
                next: FlowStep::QualifyGoal,
                fields: ProfileFields {
                    product_count: Some(count),
                    ..Default::default()
                },
                reply: goal_menu(),
            },
            None => StepDecision::Reject {
                prompt: PRODUCTS_INVALID,
            },
        },

        FlowStep::QualifyGoal => match goal(input) {
            Some(value) => StepDecision::Advance {
                next: FlowStep::Offer,
                fields: ProfileFields {
                    main_goal: Some(value.to_string()),
                    score_delta: if value == "venda" { 15 } else { 0 },
                    ..Default::default()
                },
                reply: offer_menu(),
            },
            None => StepDecision::Reject { prompt: GOAL_INVALID },
        },

        FlowStep::Offer => match offer_choice(input) {
            Some(choice) => StepDecision::Advance {
                next: FlowStep::Closing,
                fields: ProfileFields {
                    offer_choice: Some(choice.to_string()),
                    score_delta: if choice == "2" { 15 } else { 0 },
                    ..Default::default()
                },
                reply: Reply::Text(CLOSING_CONFIRM.to_string()),
            },
            None => StepDecision::Reject {
                prompt: OFFER_INVALID,
            },
        },

        // Absorbing: acknowledge and stay put.
        FlowStep::Closing => StepDecision::Advance {
            next: FlowStep::Closing,
            fields: ProfileFields::default(),
            reply: Reply::Text(CLOSING_ACK.to_string()),
        },

        FlowStep::AiChat => unreachable!("AI_CHAT is routed to the responder, not the script"),
    }
}

pub(super) fn is_reset(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(RESET_COMMAND)
}

fn normalized(input: &str) -> String {
    input.trim().to_lowercase()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Interest category + base score, by case-insensitive substring.
fn interest(input: &str) -> Option<(&'static str, i64)> {
    let text = normalized(input);
    if contains_any(&text, &["site", "profissional", "1"]) {
        Some(("site", 10))
    } else if contains_any(&text, &["commerce", "loja", "2"]) {
        Some(("commerce", 20))
    } else if contains_any(&text, &["sistemas", "3"]) {
        Some(("sistemas", 30))
    } else {
        None
    }
}

/// Yes/no family, matched per token so "talvez" never passes.
/// Canonicalized to "sim" / "não".
fn yes_no(input: &str) -> Option<&'static str> {
    let text = normalized(input);
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        match token {
            "sim" | "s" | "yes" => return Some("sim"),
            "não" | "nao" | "n" | "no" => return Some("não"),
            _ => {}
        }
    }
    None
}

/// First contiguous digit run, e.g. "uns 50 produtos" → "50".
fn first_number(input: &str) -> Option<String> {
    let digits: String = input
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (!digits.is_empty()).then_some(digits)
}

fn goal(input: &str) -> Option<&'static str> {
    let text = normalized(input);
    if contains_any(&text, &["agendamento", "agenda", "1"]) {
        Some("agendamento")
    } else if contains_any(&text, &["venda", "direta", "2"]) {
        Some("venda")
    } else {
        None
    }
}

/// Offer answer, normalized to canonical "1" (PDF) / "2" (meeting).
fn offer_choice(input: &str) -> Option<&'static str> {
    let text = normalized(input);
    if contains_any(&text, &["pdf", "1"]) {
        Some("1")
    } else if contains_any(&text, &["reunião", "reuniao", "agendar", "2"]) {
        Some("2")
    } else {
        None
    }
}

fn greeting_menu() -> Reply {
    Reply::Buttons {
        body: GREETING.to_string(),
        options: vec![
            ButtonOption::new("1", "Site profissional"),
            ButtonOption::new("2", "Loja virtual"),
            ButtonOption::new("3", "Sistemas sob medida"),
        ],
    }
}

fn yes_no_menu(body: &str) -> Reply {
    Reply::Buttons {
        body: body.to_string(),
        options: vec![
            ButtonOption::new("sim", "Sim"),
            ButtonOption::new("nao", "Não"),
        ],
    }
}

fn goal_menu() -> Reply {
    Reply::Buttons {
        body: ASK_GOAL.to_string(),
        options: vec![
            ButtonOption::new("1", "Agendamento"),
            ButtonOption::new("2", "Venda direta"),
        ],
    }
}

fn offer_menu() -> Reply {
    Reply::Buttons {
        body: OFFER_PROMPT.to_string(),
        options: vec![
            ButtonOption::new("1", "Receber apresentação em PDF"),
            ButtonOption::new("2", "Agendar uma reunião"),
        ],
    }
}

fn has_fields(fields: &ProfileFields) -> bool {
    fields.interest.is_some()
        || fields.has_site.is_some()
        || fields.sells_online.is_some()
        || fields.product_count.is_some()
        || fields.main_goal.is_some()
        || fields.offer_choice.is_some()
        || fields.score_delta != 0
}

/// Operator summary sent when a lead completes the flow.
fn format_lead_summary(contact: &Contact, profile: &LeadProfile) -> String {
    let offer = match profile.offer_choice.as_deref() {
        Some("1") => "Apresentação em PDF",
        Some("2") => "Reunião",
        _ => "—",
    };
    format!(
        "*Novo lead qualificado!* 🎯\n\n\
         Nome: {}\n\
         Telefone: {}\n\
         Interesse: {}\n\
         Já tem site: {}\n\
         Vende online: {}\n\
         Produtos: {}\n\
         Objetivo: {}\n\
         Próximo passo: {}\n\
         Pontuação: {}",
        contact.name.as_deref().unwrap_or("(sem nome)"),
        contact.phone,
        profile.interest.as_deref().unwrap_or("—"),
        profile.has_site.as_deref().unwrap_or("—"),
        profile.sells_online.as_deref().unwrap_or("—"),
        profile.product_count.as_deref().unwrap_or("—"),
        profile.main_goal.as_deref().unwrap_or("—"),
        offer,
        profile.score,
    )
}

impl Gateway {
    /// Run one scripted step: validate, send, then commit.
    pub(super) async fn run_scripted_step(
        &self,
        contact: &Contact,
        step: FlowStep,
        input: &str,
    ) -> Result<(), LeadflowError> {
        match evaluate(step, input) {
            StepDecision::Reject { prompt } => {
                debug!(
                    "invalid input for {} at {}: {input:?}",
                    contact.phone,
                    step.as_str()
                );
                let reply = Reply::Text(prompt.to_string());
                self.deliver(contact, &reply).await?;
                self.record_outbound(contact, reply.body()).await?;
            }
            StepDecision::Advance {
                next,
                fields,
                reply,
            } => {
                // Send first: the step and profile are committed only once
                // the user actually received the next question.
                self.deliver(contact, &reply).await?;

                if has_fields(&fields) {
                    self.store.upsert_profile(&contact.id, &fields).await?;
                }
                if next != step {
                    self.store.set_flow_step(&contact.id, next).await?;
                    info!(
                        "{}: {} -> {}",
                        contact.phone,
                        step.as_str(),
                        next.as_str()
                    );
                }
                self.record_outbound(contact, reply.body()).await?;

                if next == FlowStep::Closing && step == FlowStep::Offer {
                    self.notify_admin(contact).await;
                }
            }
        }
        Ok(())
    }

    /// Lead-completion notification to the operator number. Best-effort:
    /// a failure here never aborts the user-facing transition.
    async fn notify_admin(&self, contact: &Contact) {
        if self.admin_phone.is_empty() {
            debug!("no admin phone configured, skipping lead notification");
            return;
        }

        // Re-read the full profile so the summary reflects every answer,
        // including the one committed a moment ago.
        let profile = match self.store.get_profile(&contact.id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => LeadProfile {
                contact_id: contact.id.clone(),
                ..Default::default()
            },
            Err(e) => {
                warn!("lead notification profile read failed: {e}");
                return;
            }
        };

        let summary = format_lead_summary(contact, &profile);
        match self.messenger.send_text(&self.admin_phone, &summary).await {
            Ok(()) => info!("lead notification sent for {}", contact.phone),
            Err(e) => warn!("lead notification for {} failed: {e}", contact.phone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(step: FlowStep, input: &str) -> (FlowStep, ProfileFields, Reply) {
        match evaluate(step, input) {
            StepDecision::Advance {
                next,
                fields,
                reply,
            } => (next, fields, reply),
            StepDecision::Reject { prompt } => {
                panic!("expected advance from {step:?} on {input:?}, got reject: {prompt}")
            }
        }
    }

    fn reject(step: FlowStep, input: &str) -> &'static str {
        match evaluate(step, input) {
            StepDecision::Reject { prompt } => prompt,
            other => panic!("expected reject from {step:?} on {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_new_is_unconditional() {
        for input in ["oi", "", "qualquer coisa", "1"] {
            let (next, fields, reply) = advance(FlowStep::New, input);
            assert_eq!(next, FlowStep::Triage);
            assert!(!has_fields(&fields));
            match reply {
                Reply::Buttons { options, .. } => assert_eq!(options.len(), 3),
                other => panic!("greeting should be a button menu, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_triage_accepts_each_alias() {
        for (input, expected) in [
            ("site", "site"),
            ("quero um site profissional", "site"),
            ("1", "site"),
            ("loja", "commerce"),
            ("e-commerce", "commerce"),
            ("2", "commerce"),
            ("sistemas", "sistemas"),
            ("3", "sistemas"),
        ] {
            let (next, fields, _) = advance(FlowStep::Triage, input);
            assert_eq!(next, FlowStep::QualifySite);
            assert_eq!(fields.interest.as_deref(), Some(expected), "input {input:?}");
            assert!(fields.score_delta > 0);
        }
    }

    #[test]
    fn test_triage_rejects_garbage() {
        assert_eq!(reject(FlowStep::Triage, "bom dia"), TRIAGE_INVALID);
    }

    #[test]
    fn test_yes_no_family() {
        for input in ["sim", "Sim", "s", "yes", "sim, claro"] {
            assert_eq!(yes_no(input), Some("sim"), "input {input:?}");
        }
        for input in ["não", "nao", "n", "no", "acho que não"] {
            assert_eq!(yes_no(input), Some("não"), "input {input:?}");
        }
        for input in ["talvez", "sims", "nunca", ""] {
            assert_eq!(yes_no(input), None, "input {input:?}");
        }
    }

    #[test]
    fn test_qualify_site_invalid_keeps_state() {
        let prompt = reject(FlowStep::QualifySite, "talvez");
        assert_eq!(prompt, YES_NO_INVALID);
    }

    #[test]
    fn test_qualify_site_advances() {
        let (next, fields, _) = advance(FlowStep::QualifySite, "sim");
        assert_eq!(next, FlowStep::QualifyOnline);
        assert_eq!(fields.has_site.as_deref(), Some("sim"));
        assert_eq!(fields.score_delta, 10);
    }

    #[test]
    fn test_products_needs_a_digit() {
        assert_eq!(reject(FlowStep::QualifyProducts, "muitos"), PRODUCTS_INVALID);

        let (next, fields, _) = advance(FlowStep::QualifyProducts, "uns 50 produtos");
        assert_eq!(next, FlowStep::QualifyGoal);
        assert_eq!(fields.product_count.as_deref(), Some("50"));
    }

    #[test]
    fn test_goal_matching() {
        let (_, fields, _) = advance(FlowStep::QualifyGoal, "vendas");
        assert_eq!(fields.main_goal.as_deref(), Some("venda"));
        assert_eq!(fields.score_delta, 15);

        let (_, fields, _) = advance(FlowStep::QualifyGoal, "agendamento");
        assert_eq!(fields.main_goal.as_deref(), Some("agendamento"));
        assert_eq!(fields.score_delta, 0);

        assert_eq!(reject(FlowStep::QualifyGoal, "outra coisa"), GOAL_INVALID);
    }

    #[test]
    fn test_offer_normalizes_to_canonical_choice() {
        for input in ["1", "quero o pdf", "PDF"] {
            let (next, fields, _) = advance(FlowStep::Offer, input);
            assert_eq!(next, FlowStep::Closing);
            assert_eq!(fields.offer_choice.as_deref(), Some("1"), "input {input:?}");
        }
        for input in ["2", "reunião", "reuniao", "quero agendar"] {
            let (_, fields, _) = advance(FlowStep::Offer, input);
            assert_eq!(fields.offer_choice.as_deref(), Some("2"), "input {input:?}");
        }
        assert_eq!(reject(FlowStep::Offer, "hmm"), OFFER_INVALID);
    }

    #[test]
    fn test_closing_is_absorbing() {
        let (next, fields, reply) = advance(FlowStep::Closing, "obrigado!");
        assert_eq!(next, FlowStep::Closing);
        assert!(!has_fields(&fields));
        assert_eq!(reply.body(), CLOSING_ACK);
    }

    #[test]
    fn test_reset_matching() {
        assert!(is_reset("#reset"));
        assert!(is_reset("  #RESET  "));
        assert!(is_reset("#Reset"));
        assert!(!is_reset("reset"));
        assert!(!is_reset("#reset tudo"));
    }

    #[test]
    fn test_happy_path_walk() {
        let mut step = FlowStep::New;
        let inputs = ["1", "site", "sim", "sim", "50", "vendas", "1"];
        let mut captured = Vec::new();

        for input in inputs {
            let (next, fields, _) = advance(step, input);
            captured.push(fields);
            step = next;
        }

        assert_eq!(step, FlowStep::Closing);
        assert_eq!(captured[1].interest.as_deref(), Some("site"));
        assert_eq!(captured[2].has_site.as_deref(), Some("sim"));
        assert_eq!(captured[3].sells_online.as_deref(), Some("sim"));
        assert_eq!(captured[4].product_count.as_deref(), Some("50"));
        assert_eq!(captured[5].main_goal.as_deref(), Some("venda"));
        assert_eq!(captured[6].offer_choice.as_deref(), Some("1"));
    }

    #[test]
    fn test_button_reply_ids_validate_like_text() {
        // The classifier feeds button ids through the same body field.
        let (_, fields, _) = advance(FlowStep::QualifySite, "nao");
        assert_eq!(fields.has_site.as_deref(), Some("não"));

        let (_, fields, _) = advance(FlowStep::Triage, "2");
        assert_eq!(fields.interest.as_deref(), Some("commerce"));
    }

    #[test]
    fn test_lead_summary_contains_all_fields() {
        let contact = Contact {
            id: "c1".into(),
            phone: "5511999990000".into(),
            name: Some("Ana".into()),
            avatar_url: None,
            is_bot_paused: false,
            flow_step: "CLOSING".into(),
            last_interaction: chrono::Utc::now(),
        };
        let profile = LeadProfile {
            contact_id: "c1".into(),
            interest: Some("site".into()),
            has_site: Some("sim".into()),
            sells_online: Some("não".into()),
            product_count: Some("50".into()),
            main_goal: Some("venda".into()),
            offer_choice: Some("2".into()),
            score: 45,
        };
        let summary = format_lead_summary(&contact, &profile);
        for needle in ["Ana", "5511999990000", "site", "sim", "não", "50", "venda", "Reunião", "45"] {
            assert!(summary.contains(needle), "summary missing {needle:?}:\n{summary}");
        }
    }
}
