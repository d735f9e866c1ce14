//! Pure mapping from a [`SignalSnapshot`] to the screen to render.
//!
//! Priority, highest first:
//! 1. special routes (path, then fragment), never touching flags
//! 2. explicit section paths, and the `products` fragment at the root
//! 3. one-shot intents at the bare root
//! 4. the durable section, then the in-memory last known section,
//!    with marketplace only kept when it was explicitly visited
//! 5. home
//!
//! Consumed flags and carried values come back as [`FlagMutation`]s; applying
//! them and resolving again yields the same view with no further mutations.

use glory_core::{
    match_fragment, match_path, Access, RouteMatch, Section, SignalSnapshot, SpecialTarget,
    SubView, ViewState,
};

use crate::flags::{FlagKey, FlagMutation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub view: ViewState,
    pub mutations: Vec<FlagMutation>,
}

impl Resolution {
    fn new(view: ViewState) -> Self {
        Self {
            view,
            mutations: Vec::new(),
        }
    }

    /// One-shot flags cleared by this resolution.
    pub fn consumed_flags(&self) -> Vec<FlagKey> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                FlagMutation::Clear(key) if key.owner().is_some() => Some(*key),
                _ => None,
            })
            .collect()
    }
}

pub fn resolve(snap: &SignalSnapshot) -> Resolution {
    let path_match = match_path(&snap.path);
    if let RouteMatch::Special(target) = &path_match {
        return Resolution::new(special_view(target, snap));
    }
    let fragment_match = match_fragment(&snap.fragment);
    if let RouteMatch::Special(target) = &fragment_match {
        return Resolution::new(special_view(target, snap));
    }

    let mut mutations = Vec::new();
    let section = match path_match {
        RouteMatch::Section(section) => explicit(section, snap, &mut mutations),
        RouteMatch::Unknown => Section::Home,
        RouteMatch::BareRoot | RouteMatch::Special(_) => match fragment_match {
            RouteMatch::Section(section) => explicit(section, snap, &mut mutations),
            _ => from_signals(snap, &mut mutations),
        },
    };

    let sub_view = sub_view_for(section, snap, &mut mutations);
    Resolution {
        view: ViewState::section(section, sub_view),
        mutations,
    }
}

fn special_view(target: &SpecialTarget, snap: &SignalSnapshot) -> ViewState {
    match target {
        SpecialTarget::Route(route) => ViewState::special(
            route.clone(),
            Access::gate(route.requires_session(), snap.authenticated, snap.loading),
        ),
        SpecialTarget::Admin => ViewState::section(Section::Admin, SubView::Dashboard)
            .with_access(Access::gate(true, snap.authenticated, snap.loading)),
        SpecialTarget::Shopkeeper => ViewState::section(Section::Shopkeeper, SubView::Dashboard)
            .with_access(Access::gate(true, snap.authenticated, snap.loading)),
    }
}

fn carry_section(section: Section, snap: &SignalSnapshot, out: &mut Vec<FlagMutation>) {
    if snap.durable_section != Some(section) {
        out.push(FlagMutation::set(FlagKey::SelectedSection, section.as_str()));
    }
}

fn explicit(section: Section, snap: &SignalSnapshot, out: &mut Vec<FlagMutation>) -> Section {
    match section {
        Section::CvBuilder if snap.intents.navigate_to_section_a => {
            out.push(FlagMutation::Clear(FlagKey::NavigateToSectionA));
        }
        Section::IdCardPrint if snap.intents.navigate_to_section_b => {
            out.push(FlagMutation::Clear(FlagKey::NavigateToSectionB));
        }
        _ => {}
    }
    carry_section(section, snap, out);
    section
}

fn from_signals(snap: &SignalSnapshot, out: &mut Vec<FlagMutation>) -> Section {
    let intents = &snap.intents;
    if intents.any() {
        let chosen = if intents.navigate_to_section_a {
            Section::CvBuilder
        } else if intents.navigate_to_section_b {
            Section::IdCardPrint
        } else {
            Section::Home
        };
        for (present, key) in [
            (intents.navigate_to_section_a, FlagKey::NavigateToSectionA),
            (intents.navigate_to_section_b, FlagKey::NavigateToSectionB),
            (intents.navigate_home, FlagKey::NavigateHome),
        ] {
            if present {
                out.push(FlagMutation::Clear(key));
            }
        }
        carry_section(chosen, snap, out);
        return chosen;
    }

    let last_known = snap.last_known_section.filter(|s| s.is_restorable());
    let restored = snap
        .durable_section
        .filter(|s| s.is_restorable())
        .or(last_known)
        .unwrap_or(Section::Home);

    if restored == Section::Marketplace
        && !snap.explicitly_visited_marketplace
        && last_known != Some(Section::Marketplace)
    {
        return last_known
            .filter(|s| *s != Section::Marketplace)
            .unwrap_or(Section::Home);
    }
    restored
}

fn sub_view_for(section: Section, snap: &SignalSnapshot, out: &mut Vec<FlagMutation>) -> SubView {
    let (marker, marker_key, durable, mode_key, active) = match section {
        Section::CvBuilder => (
            snap.actions.continue_editing,
            FlagKey::ContinueEditing,
            snap.cv_view_mode,
            FlagKey::CvViewMode,
            SubView::Editor,
        ),
        Section::IdCardPrint => (
            snap.actions.continue_printing,
            FlagKey::ContinuePrinting,
            snap.id_card_view_mode,
            FlagKey::IdCardViewMode,
            SubView::Print,
        ),
        _ => return SubView::Dashboard,
    };

    if marker {
        out.push(FlagMutation::Clear(marker_key));
        if durable != Some(active) {
            out.push(FlagMutation::set(mode_key, active.as_str()));
        }
        return active;
    }
    if durable == Some(active) {
        active
    } else {
        SubView::Dashboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glory_core::SpecialRoute;

    fn root() -> SignalSnapshot {
        SignalSnapshot::at("/")
    }

    #[test]
    fn empty_snapshot_is_home_without_mutations() {
        let r = resolve(&root());
        assert_eq!(r.view, ViewState::home());
        assert!(r.mutations.is_empty());
    }

    #[test]
    fn special_route_ignores_and_keeps_intents() {
        let mut snap = SignalSnapshot::at("/cart");
        snap.intents.navigate_to_section_a = true;
        snap.durable_section = Some(Section::CvBuilder);

        let r = resolve(&snap);
        assert_eq!(r.view.special_route, Some(SpecialRoute::Cart));
        assert_eq!(r.view.access, Access::Granted);
        assert!(r.mutations.is_empty());
    }

    #[test]
    fn protected_special_route_branches_on_auth() {
        let mut snap = root();
        snap.fragment = "order-details=77".into();
        assert_eq!(resolve(&snap).view.access, Access::LoginRequired);

        snap.loading = true;
        assert_eq!(resolve(&snap).view.access, Access::AwaitingIdentity);

        snap.authenticated = true;
        let view = resolve(&snap).view;
        assert_eq!(view.access, Access::Granted);
        assert_eq!(
            view.special_route,
            Some(SpecialRoute::OrderDetails {
                order_id: Some("77".into())
            })
        );
    }

    #[test]
    fn explicit_path_consumes_only_its_own_intent() {
        let mut snap = SignalSnapshot::at("/id-card-print");
        snap.intents.navigate_to_section_a = true;
        snap.intents.navigate_to_section_b = true;

        let r = resolve(&snap);
        assert_eq!(r.view.section, Section::IdCardPrint);
        assert_eq!(r.consumed_flags(), vec![FlagKey::NavigateToSectionB]);
        assert!(r
            .mutations
            .contains(&FlagMutation::set(FlagKey::SelectedSection, "id-card-print")));
    }

    #[test]
    fn intent_a_wins_and_all_intents_are_consumed() {
        let mut snap = root();
        snap.intents.navigate_to_section_a = true;
        snap.intents.navigate_home = true;
        snap.durable_section = Some(Section::Marketplace);

        let r = resolve(&snap);
        assert_eq!(r.view.section, Section::CvBuilder);
        assert_eq!(
            r.consumed_flags(),
            vec![FlagKey::NavigateToSectionA, FlagKey::NavigateHome]
        );
    }

    #[test]
    fn unknown_path_degrades_to_home() {
        let mut snap = SignalSnapshot::at("/does-not-exist");
        snap.durable_section = Some(Section::CvBuilder);
        snap.intents.navigate_to_section_b = true;
        let r = resolve(&snap);
        assert_eq!(r.view, ViewState::home());
        assert!(r.mutations.is_empty());
    }

    #[test]
    fn durable_admin_is_not_restored() {
        let mut snap = root();
        snap.durable_section = Some(Section::Admin);
        snap.last_known_section = Some(Section::IdCardPrint);
        assert_eq!(resolve(&snap).view.section, Section::IdCardPrint);
    }

    #[test]
    fn products_fragment_is_an_explicit_marketplace_visit() {
        let mut snap = root();
        snap.fragment = "#products".into();
        snap.last_known_section = Some(Section::CvBuilder);
        assert_eq!(resolve(&snap).view.section, Section::Marketplace);
    }

    #[test]
    fn continue_editing_opens_editor_and_carries_mode() {
        let mut snap = SignalSnapshot::at("/cv-builder");
        snap.actions.continue_editing = true;

        let r = resolve(&snap);
        assert_eq!(r.view.sub_view, SubView::Editor);
        assert!(r.consumed_flags().contains(&FlagKey::ContinueEditing));
        assert!(r
            .mutations
            .contains(&FlagMutation::set(FlagKey::CvViewMode, "editor")));
    }

    #[test]
    fn durable_print_mode_restores_print_view() {
        let mut snap = root();
        snap.durable_section = Some(Section::IdCardPrint);
        snap.id_card_view_mode = Some(SubView::Print);
        let r = resolve(&snap);
        assert_eq!(
            r.view,
            ViewState::section(Section::IdCardPrint, SubView::Print)
        );
        assert!(r.mutations.is_empty());
    }
}
