//! Canned interactive templates for the sign-up funnel. Row ids here must
//! stay in lockstep with the selection mapping in `dirtybox_core::funnel`.

use dirtybox_core::{
    PricingPlan, StructuredData, Weekday, BIG_PURCHASE_NO, BIG_PURCHASE_YES,
    PAYMENT_BANK_TRANSFER, PAYMENT_CHEQUE, PRICING_ID_PREFIX, WARD_MAX, WARD_MIN,
};

use crate::client::{ButtonPrompt, ListMenu, MenuRow, MenuSection};

pub fn ward_menu() -> ListMenu {
    let rows = (WARD_MIN..=WARD_MAX)
        .map(|ward| MenuRow {
            id: ward.to_string(),
            title: format!("Ward {ward}"),
            description: None,
        })
        .collect();

    ListMenu {
        body: "Great, we cover Block 6! Which ward are you in?".to_owned(),
        button_label: "Select ward".to_owned(),
        sections: vec![MenuSection { title: "Block 6 wards".to_owned(), rows }],
    }
}

pub fn property_type_menu() -> ListMenu {
    let rows = vec![
        MenuRow { id: "domestic".to_owned(), title: "Domestic".to_owned(), description: None },
        MenuRow { id: "commercial".to_owned(), title: "Commercial".to_owned(), description: None },
        MenuRow {
            id: "institutional".to_owned(),
            title: "Institutional".to_owned(),
            description: None,
        },
    ];

    ListMenu {
        body: "What kind of property is this for?".to_owned(),
        button_label: "Property type".to_owned(),
        sections: vec![MenuSection { title: "Property types".to_owned(), rows }],
    }
}

pub fn bin_size_menu() -> ListMenu {
    // Backend object ids for the current catalogue entries.
    let rows = vec![
        MenuRow {
            id: "66a0f1e2d3c4b5a697881920".to_owned(),
            title: "120L Bin".to_owned(),
            description: Some("Fits a small household".to_owned()),
        },
        MenuRow {
            id: "66a0f1e2d3c4b5a697881921".to_owned(),
            title: "240L Bin".to_owned(),
            description: Some("Standard family size".to_owned()),
        },
        MenuRow {
            id: "66a0f1e2d3c4b5a697881922".to_owned(),
            title: "660L Bin".to_owned(),
            description: Some("For commercial premises".to_owned()),
        },
    ];

    ListMenu {
        body: "Which bin size would you like?".to_owned(),
        button_label: "Bin sizes".to_owned(),
        sections: vec![MenuSection { title: "Available bins".to_owned(), rows }],
    }
}

pub fn frequency_menu() -> ListMenu {
    let rows = vec![
        MenuRow {
            id: "once_per_week".to_owned(),
            title: "Once a week".to_owned(),
            description: None,
        },
        MenuRow {
            id: "twice_per_week".to_owned(),
            title: "Twice a week".to_owned(),
            description: None,
        },
        MenuRow {
            id: "thrice_per_week".to_owned(),
            title: "Three times a week".to_owned(),
            description: None,
        },
        MenuRow { id: "daily".to_owned(), title: "Daily".to_owned(), description: None },
    ];

    ListMenu {
        body: "How often should we pick up?".to_owned(),
        button_label: "Frequency".to_owned(),
        sections: vec![MenuSection { title: "Pickup frequency".to_owned(), rows }],
    }
}

pub fn pickup_days_menu() -> ListMenu {
    let rows = Weekday::ALL
        .iter()
        .map(|day| MenuRow {
            id: day.as_str().to_owned(),
            title: capitalise(day.as_str()),
            description: None,
        })
        .collect();

    ListMenu {
        body: "Pick your preferred pickup day. For multi-day plans, pick the first day and we schedule the rest.".to_owned(),
        button_label: "Pickup day".to_owned(),
        sections: vec![MenuSection { title: "Days of the week".to_owned(), rows }],
    }
}

pub fn big_purchase_buttons() -> ButtonPrompt {
    ButtonPrompt {
        body: "One last thing: are you planning any big purchase, like a renovation or clear-out, that would need extra pickups?".to_owned(),
        buttons: vec![
            MenuRow { id: BIG_PURCHASE_YES.to_owned(), title: "Yes".to_owned(), description: None },
            MenuRow { id: BIG_PURCHASE_NO.to_owned(), title: "No".to_owned(), description: None },
        ],
    }
}

pub fn payment_method_buttons() -> ButtonPrompt {
    ButtonPrompt {
        body: "How would you like to pay?".to_owned(),
        buttons: vec![
            MenuRow {
                id: PAYMENT_BANK_TRANSFER.to_owned(),
                title: "Bank transfer".to_owned(),
                description: None,
            },
            MenuRow { id: PAYMENT_CHEQUE.to_owned(), title: "Cheque".to_owned(), description: None },
        ],
    }
}

pub fn pricing_menu(plans: &[PricingPlan]) -> ListMenu {
    let rows = plans
        .iter()
        .map(|plan| {
            let description = match &plan.discounted_price {
                Some(discounted) => {
                    Some(format!("{} {} (was {})", plan.currency, discounted, plan.price))
                }
                None => Some(format!("{} {}", plan.currency, plan.price)),
            };
            MenuRow {
                id: format!("{PRICING_ID_PREFIX}{}", plan.id),
                title: plan.name.clone(),
                description,
            }
        })
        .collect();

    ListMenu {
        body: "Here are the plans that match your choices:".to_owned(),
        button_label: "Plans".to_owned(),
        sections: vec![MenuSection { title: "Pricing plans".to_owned(), rows }],
    }
}

pub fn ask_address_prompt() -> &'static str {
    "Thanks! Could you share your full street address so we can register you?"
}

pub fn ask_transaction_id_prompt() -> &'static str {
    "Please reply with the transaction reference once you have made the payment."
}

pub fn outside_service_area_prompt() -> &'static str {
    "We're sorry, we don't cover your area yet. Our pickups currently run in Block 6 only, and we'll get in touch as soon as that changes."
}

pub fn selection_recorded_prompt() -> &'static str {
    "Got it, noted!"
}

pub fn apology_prompt() -> &'static str {
    "Sorry, something went wrong on our side. Please try again in a moment."
}

pub fn subscriber_summary(state: &StructuredData) -> String {
    let days = state
        .pickup_days
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|day| capitalise(day.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You're all set! Here's your subscription:\n\
         Name: {}\n\
         Address: {}, Ward {}\n\
         Bin: {}\n\
         Frequency: {}\n\
         Pickup days: {}\n\
         We'll confirm your first pickup shortly.",
        field(&state.fullname),
        field(&state.address),
        state.ward_number.map(|ward| ward.to_string()).unwrap_or_else(|| "-".to_owned()),
        field(&state.bin_size),
        state.frequency.as_deref().map(humanise_frequency).unwrap_or("-"),
        if days.is_empty() { "-".to_owned() } else { days },
    )
}

pub fn non_subscriber_summary(state: &StructuredData) -> String {
    format!(
        "Thanks {}! We've noted you're not after a subscription right now. \
         Our team will call you around {} to see how else we can help.",
        field(&state.fullname),
        field(&state.free_time),
    )
}

fn humanise_frequency(frequency: &str) -> &str {
    match frequency {
        "once_per_week" => "once a week",
        "twice_per_week" => "twice a week",
        "thrice_per_week" => "three times a week",
        "daily" => "daily",
        other => other,
    }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
