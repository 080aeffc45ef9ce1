use std::{cmp, io, thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use hoteldesk_core::{
    AppConfig, Customer, CustomerBooking, CustomerUpdate, DataEvent, Hotel, HotelBookings,
    HotelUpdate, Ledger, LedgerDrift, RecordId, Reservation,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_INPUT_LEN: usize = 64;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Hotels,
    Customers,
    Reservations,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Hotels, Tab::Customers, Tab::Reservations];

    fn index(self) -> usize {
        match self {
            Tab::Hotels => 0,
            Tab::Customers => 1,
            Tab::Reservations => 2,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Tab::Hotels => "Hotels",
            Tab::Customers => "Customers",
            Tab::Reservations => "Reservations",
        }
    }

    fn next(self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    fn prev(self) -> Self {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }

    fn help(self) -> &'static str {
        match self {
            Tab::Hotels => "a add · e edit · d delete · b book room · c cancel booking",
            Tab::Customers => "a add · e edit · d delete",
            Tab::Reservations => "a add record · d delete record",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
    CreateHotel,
    EditHotel(RecordId),
    BookRoom(RecordId),
    CancelBooking(RecordId),
    AddCustomer,
    EditCustomer(RecordId),
    AddReservation,
}

#[derive(Debug, Clone)]
struct FormField {
    label: &'static str,
    input: String,
    cursor: usize,
    numeric: bool,
}

impl FormField {
    fn text(label: &'static str, initial: impl Into<String>) -> Self {
        let input: String = initial.into();
        let cursor = input.chars().count();
        Self {
            label,
            input,
            cursor,
            numeric: false,
        }
    }

    fn number(label: &'static str, initial: Option<u32>) -> Self {
        let mut field = Self::text(label, initial.map(|value| value.to_string()).unwrap_or_default());
        field.numeric = true;
        field
    }

    fn char_len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_offset(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(offset, _)| offset)
            .unwrap_or(self.input.len())
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.char_len() as isize;
        self.cursor = (self.cursor as isize + delta).clamp(0, len) as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.char_len();
    }

    fn insert(&mut self, ch: char) {
        if self.char_len() >= MAX_INPUT_LEN || ch.is_control() {
            return;
        }
        if self.numeric && !ch.is_ascii_digit() {
            return;
        }
        let offset = self.byte_offset();
        self.input.insert(offset, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let offset = self.byte_offset();
        self.input.remove(offset);
    }

    fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let offset = self.byte_offset();
            self.input.remove(offset);
        }
    }

    fn value(&self) -> &str {
        self.input.trim()
    }
}

#[derive(Debug, Clone)]
struct FormModal {
    title: String,
    kind: FormKind,
    fields: Vec<FormField>,
    focus: usize,
}

impl FormModal {
    fn new(kind: FormKind, title: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self {
            title: title.into(),
            kind,
            fields,
            focus: 0,
        }
    }

    fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(FormField::value).unwrap_or("")
    }

    fn focused_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.focus)
    }

    fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    fn prev_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingDelete {
    Hotel(RecordId),
    Customer(RecordId),
    Reservation(RecordId),
}

#[derive(Debug, Clone)]
struct ConfirmModal {
    message: String,
    action: PendingDelete,
}

enum AppEvent {
    Input(Event),
    Tick,
}

#[derive(Debug, Default)]
struct Snapshot {
    hotels: Vec<Hotel>,
    customers: Vec<Customer>,
    reservations: Vec<Reservation>,
    drift: Vec<LedgerDrift>,
}

impl Snapshot {
    fn len(&self, tab: Tab) -> usize {
        match tab {
            Tab::Hotels => self.hotels.len(),
            Tab::Customers => self.customers.len(),
            Tab::Reservations => self.reservations.len(),
        }
    }

    fn customer_name(&self, id: RecordId) -> Option<&str> {
        self.customers
            .iter()
            .find(|customer| customer.id == id)
            .map(|customer| customer.name.as_str())
    }

    fn hotel_name(&self, id: RecordId) -> Option<&str> {
        self.hotels
            .iter()
            .find(|hotel| hotel.id == id)
            .map(|hotel| hotel.name.as_str())
    }
}

#[derive(Debug)]
enum Detail {
    Empty,
    Hotel(HotelBookings),
    Customer(Customer, Vec<CustomerBooking>),
    Reservation(Reservation),
    Failed(String),
}

/// Terminal console over the hotel, customer and reservation collections.
pub struct DeskApp {
    ledger: Ledger,
    config: AppConfig,
    theme: Theme,
    state: UiState,
    data: Snapshot,
    detail: Detail,
    form: Option<FormModal>,
    confirm: Option<ConfirmModal>,
    data_rx: Option<mpsc::Receiver<DataEvent>>,
}

impl DeskApp {
    pub fn new(ledger: Ledger, config: AppConfig) -> Self {
        Self {
            ledger,
            config,
            theme: Theme::default(),
            state: UiState::default(),
            data: Snapshot::default(),
            detail: Detail::Empty,
            form: None,
            confirm: None,
            data_rx: None,
        }
    }

    pub fn attach_watcher(&mut self, receiver: mpsc::Receiver<DataEvent>) {
        self.data_rx = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        match self.reload() {
            Ok(()) => self.state.set_status(format!(
                "Loaded {} hotels, {} customers, {} reservations from {}",
                self.data.hotels.len(),
                self.data.customers.len(),
                self.data.reservations.len(),
                self.config.data_dir.display()
            )),
            Err(err) => self.state.set_status(format!("Failed to load data: {err:#}")),
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let mut data_rx = self.data_rx.take();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }

            if let Some(rx) = data_rx.as_mut() {
                let mut watcher_closed = false;
                tokio::select! {
                    maybe_event = event_rx.recv() => {
                        if !self.process_app_event(maybe_event) {
                            break;
                        }
                    }
                    maybe_data = rx.recv() => {
                        match maybe_data {
                            Some(event) => self.handle_data_event(event),
                            None => watcher_closed = true,
                        }
                    }
                }
                if watcher_closed {
                    data_rx = None;
                }
            } else {
                let maybe_event = event_rx.recv().await;
                if !self.process_app_event(maybe_event) {
                    break;
                }
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.data = Snapshot {
            hotels: self.ledger.hotels().list()?,
            customers: self.ledger.customers().list()?,
            reservations: self.ledger.reservations().list()?,
            drift: self.ledger.reconcile()?,
        };
        for tab in Tab::ALL {
            self.state.clamp_cursor(tab, self.data.len(tab));
        }
        self.refresh_detail();
        debug!(
            hotels = self.data.hotels.len(),
            customers = self.data.customers.len(),
            reservations = self.data.reservations.len(),
            "Data reloaded"
        );
        Ok(())
    }

    fn refresh_detail(&mut self) {
        let cursor = self.state.cursor();
        let detail = match self.state.tab {
            Tab::Hotels => self
                .data
                .hotels
                .get(cursor)
                .map(|hotel| self.ledger.by_hotel(hotel.id).map(Detail::Hotel).map_err(anyhow::Error::from)),
            Tab::Customers => self.data.customers.get(cursor).map(|customer| {
                self.ledger
                    .by_customer(customer.id)
                    .map(|bookings| Detail::Customer(customer.clone(), bookings))
                    .map_err(anyhow::Error::from)
            }),
            Tab::Reservations => self
                .data
                .reservations
                .get(cursor)
                .map(|reservation| Ok(Detail::Reservation(*reservation))),
        };
        self.detail = match detail {
            None => Detail::Empty,
            Some(Ok(detail)) => detail,
            Some(Err(err)) => Detail::Failed(format!("{err:#}")),
        };
    }

    fn handle_data_event(&mut self, event: DataEvent) {
        match event {
            DataEvent::Changed(path) => {
                debug!(path = %path.display(), "Data file changed");
                if let Err(err) = self.reload() {
                    error!(?err, "Reload after change failed");
                    self.state.set_status(format!("Reload failed: {err:#}"));
                }
            }
            DataEvent::Error(err) => {
                error!(?err, "File watcher failed");
                self.state.set_status(format!("Watcher error: {err:#}"));
            }
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                let outcome = if self.confirm.is_some() {
                    self.handle_confirm_key(key)
                } else if self.form.is_some() {
                    self.handle_form_key(key)
                } else {
                    self.handle_key(key)
                };
                if let Err(err) = outcome {
                    self.state.set_status(format!("Error: {err:#}"));
                }
                true
            }
            Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => true,
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.state.should_quit = true,
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.reload()?;
                self.state.set_status("Reloaded".to_string());
            }
            KeyCode::Tab => self.switch_tab(self.state.tab.next()),
            KeyCode::BackTab => self.switch_tab(self.state.tab.prev()),
            KeyCode::Char('1') => self.switch_tab(Tab::Hotels),
            KeyCode::Char('2') => self.switch_tab(Tab::Customers),
            KeyCode::Char('3') => self.switch_tab(Tab::Reservations),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Char('g') | KeyCode::Home => self.move_to(0),
            KeyCode::Char('G') | KeyCode::End => {
                let last = self.data.len(self.state.tab).saturating_sub(1);
                self.move_to(last);
            }
            _ => match self.state.tab {
                Tab::Hotels => self.handle_hotel_key(key),
                Tab::Customers => self.handle_customer_key(key),
                Tab::Reservations => self.handle_reservation_key(key),
            },
        }
        Ok(())
    }

    fn handle_hotel_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('a') {
            self.form = Some(FormModal::new(
                FormKind::CreateHotel,
                "New hotel",
                vec![FormField::text("Name", ""), FormField::number("Rooms", None)],
            ));
            return;
        }
        let Some(hotel) = self.data.hotels.get(self.state.cursor()).cloned() else {
            return;
        };
        match key.code {
            KeyCode::Char('e') => {
                self.form = Some(FormModal::new(
                    FormKind::EditHotel(hotel.id),
                    format!("Edit hotel #{}", hotel.id),
                    vec![
                        FormField::text("Name", hotel.name.clone()),
                        FormField::number("Rooms", Some(hotel.room_count)),
                    ],
                ));
            }
            KeyCode::Char('d') => {
                self.confirm = Some(ConfirmModal {
                    message: format!("Delete hotel #{} '{}'?", hotel.id, hotel.name),
                    action: PendingDelete::Hotel(hotel.id),
                });
            }
            KeyCode::Char('b') => {
                self.form = Some(FormModal::new(
                    FormKind::BookRoom(hotel.id),
                    format!("Book a room in '{}'", hotel.name),
                    vec![FormField::number("Customer id", None)],
                ));
            }
            KeyCode::Char('c') => {
                self.form = Some(FormModal::new(
                    FormKind::CancelBooking(hotel.id),
                    format!("Cancel a booking in '{}'", hotel.name),
                    vec![FormField::number("Customer id", None)],
                ));
            }
            _ => {}
        }
    }

    fn handle_customer_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('a') {
            self.form = Some(FormModal::new(
                FormKind::AddCustomer,
                "New customer",
                vec![FormField::text("Name", ""), FormField::number("Age", None)],
            ));
            return;
        }
        let Some(customer) = self.data.customers.get(self.state.cursor()).cloned() else {
            return;
        };
        match key.code {
            KeyCode::Char('e') => {
                self.form = Some(FormModal::new(
                    FormKind::EditCustomer(customer.id),
                    format!("Edit customer #{}", customer.id),
                    vec![
                        FormField::text("Name", customer.name.clone()),
                        FormField::number("Age", Some(customer.age)),
                    ],
                ));
            }
            KeyCode::Char('d') => {
                self.confirm = Some(ConfirmModal {
                    message: format!("Delete customer #{} '{}'?", customer.id, customer.name),
                    action: PendingDelete::Customer(customer.id),
                });
            }
            _ => {}
        }
    }

    fn handle_reservation_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('a') => {
                self.form = Some(FormModal::new(
                    FormKind::AddReservation,
                    "New reservation record",
                    vec![
                        FormField::number("Customer id", None),
                        FormField::number("Hotel id", None),
                    ],
                ));
            }
            KeyCode::Char('d') => {
                if let Some(reservation) = self.data.reservations.get(self.state.cursor()) {
                    self.confirm = Some(ConfirmModal {
                        message: format!("Delete reservation #{}?", reservation.id),
                        action: PendingDelete::Reservation(reservation.id),
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.form = None;
                self.state.set_status("Cancelled".to_string());
                return Ok(());
            }
            KeyCode::Enter => {
                if let Some(form) = self.form.take() {
                    match self.submit_form(&form) {
                        Ok(message) => {
                            info!(form = %form.title, "{message}");
                            self.state.set_status(message);
                            self.reload()?;
                        }
                        Err(err) => {
                            self.state.set_status(format!("Error: {err:#}"));
                            self.form = Some(form);
                        }
                    }
                }
                return Ok(());
            }
            _ => {}
        }

        let Some(form) = self.form.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            code => {
                if let Some(field) = form.focused_mut() {
                    match code {
                        KeyCode::Left => field.move_cursor(-1),
                        KeyCode::Right => field.move_cursor(1),
                        KeyCode::Home => field.move_home(),
                        KeyCode::End => field.move_end(),
                        KeyCode::Backspace => field.backspace(),
                        KeyCode::Delete => field.delete(),
                        KeyCode::Char(ch)
                            if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
                        {
                            field.insert(ch)
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn submit_form(&self, form: &FormModal) -> Result<String> {
        match form.kind {
            FormKind::CreateHotel => {
                let name = required_text(form.value(0), "Name")?;
                let rooms = required_number(form.value(1), "Rooms")?;
                let hotel = self.ledger.hotels().create(name, rooms)?;
                Ok(format!("Hotel '{}' created with id {}", hotel.name, hotel.id))
            }
            FormKind::EditHotel(id) => {
                let update = HotelUpdate {
                    name: Some(form.value(0).to_string()),
                    room_count: parse_number(form.value(1), "Rooms")?,
                };
                let hotel = self.ledger.hotels().update(id, update)?;
                Ok(format!(
                    "Hotel #{} is now '{}' with {} rooms",
                    hotel.id, hotel.name, hotel.room_count
                ))
            }
            FormKind::BookRoom(hotel_id) => {
                let customer_id = required_number(form.value(0), "Customer id")?;
                let reservation = self.ledger.book(hotel_id, customer_id)?;
                Ok(format!(
                    "Room reserved in hotel #{hotel_id} for customer #{customer_id} (record #{})",
                    reservation.id
                ))
            }
            FormKind::CancelBooking(hotel_id) => {
                let customer_id = required_number(form.value(0), "Customer id")?;
                let removed = self.ledger.cancel(hotel_id, customer_id)?;
                Ok(match removed {
                    Some(record) => format!(
                        "Booking cancelled in hotel #{hotel_id} (record #{} removed)",
                        record.id
                    ),
                    None => format!("Booking cancelled in hotel #{hotel_id}"),
                })
            }
            FormKind::AddCustomer => {
                let name = required_text(form.value(0), "Name")?;
                let age = required_number(form.value(1), "Age")?;
                let customer = self.ledger.customers().add(name, age)?;
                Ok(format!("Customer '{}' added with id {}", customer.name, customer.id))
            }
            FormKind::EditCustomer(id) => {
                let update = CustomerUpdate {
                    name: Some(form.value(0).to_string()),
                    age: parse_number(form.value(1), "Age")?,
                };
                let customer = self.ledger.customers().update(id, update)?;
                Ok(format!(
                    "Customer #{} is now '{}', age {}",
                    customer.id, customer.name, customer.age
                ))
            }
            FormKind::AddReservation => {
                let customer_id = required_number(form.value(0), "Customer id")?;
                let hotel_id = required_number(form.value(1), "Hotel id")?;
                let reservation = self.ledger.reservations().add(customer_id, hotel_id)?;
                Ok(format!("Reservation record #{} added", reservation.id))
            }
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if let Some(confirm) = self.confirm.take() {
                    let message = self.apply_delete(confirm.action)?;
                    self.state.set_status(message);
                    self.reload()?;
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm = None;
                self.state.set_status("Delete cancelled".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_delete(&self, action: PendingDelete) -> Result<String> {
        let (label, id, removed) = match action {
            PendingDelete::Hotel(id) => ("Hotel", id, self.ledger.hotels().delete(id)?),
            PendingDelete::Customer(id) => ("Customer", id, self.ledger.customers().delete(id)?),
            PendingDelete::Reservation(id) => {
                ("Reservation", id, self.ledger.reservations().delete(id)?)
            }
        };
        Ok(if removed {
            format!("{label} #{id} deleted")
        } else {
            format!("{label} #{id} was already gone")
        })
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.state.tab = tab;
        self.refresh_detail();
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.data.len(self.state.tab);
        self.state.move_cursor(delta, len);
        self.refresh_detail();
    }

    fn move_to(&mut self, index: usize) {
        let len = self.data.len(self.state.tab);
        self.state.move_to(index, len);
        self.refresh_detail();
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(area);

        self.render_tabs(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[1]);
        self.render_list(frame, body[0]);
        self.render_detail(frame, body[1]);
        self.render_status(frame, chunks[2]);

        if let Some(form) = &self.form {
            self.render_form(frame, form);
        }
        if let Some(confirm) = &self.confirm {
            self.render_confirm(frame, confirm);
        }
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Tab::ALL
            .iter()
            .map(|tab| {
                Line::from(format!(
                    " {} {} ({}) ",
                    tab.index() + 1,
                    tab.title(),
                    self.data.len(*tab)
                ))
            })
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.state.tab.index())
            .block(Block::default().borders(Borders::ALL).title("hoteldesk"))
            .style(Style::default().fg(self.theme.muted))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn render_list(&self, frame: &mut Frame, area: Rect) {
        let name_style = Style::default()
            .fg(self.theme.primary_fg)
            .add_modifier(Modifier::BOLD);
        let muted = Style::default().fg(self.theme.muted);
        let items: Vec<ListItem> = match self.state.tab {
            Tab::Hotels => self
                .data
                .hotels
                .iter()
                .map(|hotel| {
                    let availability = hotel.availability();
                    let fill = if availability.available == 0 {
                        self.theme.danger
                    } else {
                        self.theme.success
                    };
                    ListItem::new(Line::from(vec![
                        Span::styled(format!("#{:<4}", hotel.id), muted),
                        Span::styled(hotel.name.clone(), name_style),
                        Span::styled(
                            format!("  {}/{}", availability.reserved, availability.room_count),
                            Style::default().fg(fill),
                        ),
                    ]))
                })
                .collect(),
            Tab::Customers => self
                .data
                .customers
                .iter()
                .map(|customer| {
                    ListItem::new(Line::from(vec![
                        Span::styled(format!("#{:<4}", customer.id), muted),
                        Span::styled(customer.name.clone(), name_style),
                        Span::styled(format!("  {} years", customer.age), muted),
                    ]))
                })
                .collect(),
            Tab::Reservations => self
                .data
                .reservations
                .iter()
                .map(|reservation| {
                    ListItem::new(Line::from(vec![
                        Span::styled(format!("#{:<4}", reservation.id), muted),
                        Span::raw(format!(
                            "customer #{} → hotel #{}",
                            reservation.customer_id, reservation.hotel_id
                        )),
                    ]))
                })
                .collect(),
        };

        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(self.state.cursor()));
        }
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(self.state.tab.title()))
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect) {
        let label = Style::default().fg(self.theme.muted);
        let heading = Style::default()
            .fg(self.theme.accent)
            .add_modifier(Modifier::BOLD);
        let mut lines: Vec<Line> = Vec::new();

        match &self.detail {
            Detail::Empty => lines.push(Line::from(Span::styled(
                "Nothing selected. Press 'a' to add a record.",
                label,
            ))),
            Detail::Failed(message) => lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(self.theme.danger),
            ))),
            Detail::Hotel(bookings) => {
                let hotel = &bookings.hotel;
                let availability = hotel.availability();
                lines.push(Line::from(Span::styled(hotel.name.clone(), heading)));
                lines.push(Line::from(vec![
                    Span::styled("Rooms: ", label),
                    Span::raw(availability.room_count.to_string()),
                    Span::styled("  Reserved: ", label),
                    Span::raw(availability.reserved.to_string()),
                    Span::styled("  Available: ", label),
                    Span::raw(availability.available.to_string()),
                ]));
                lines.push(Line::from(""));
                if bookings.guests.is_empty() {
                    lines.push(Line::from(Span::styled("No rooms reserved", label)));
                } else {
                    lines.push(Line::from(Span::styled("Guests", heading)));
                    for guest in &bookings.guests {
                        let name = guest
                            .customer
                            .as_ref()
                            .map(|customer| customer.name.clone())
                            .unwrap_or_else(|| "(unknown customer)".to_string());
                        lines.push(Line::from(format!(
                            "  #{} {} · {} room(s)",
                            guest.customer_id, name, guest.rooms
                        )));
                    }
                }
                lines.push(Line::from(Span::styled(
                    format!("{} reservation record(s) point here", bookings.records.len()),
                    label,
                )));
                self.push_drift_lines(&mut lines, |drift| drift.hotel_id == hotel.id);
            }
            Detail::Customer(customer, bookings) => {
                lines.push(Line::from(Span::styled(customer.name.clone(), heading)));
                lines.push(Line::from(vec![
                    Span::styled("Age: ", label),
                    Span::raw(customer.age.to_string()),
                ]));
                lines.push(Line::from(""));
                if bookings.is_empty() {
                    lines.push(Line::from(Span::styled("No bookings", label)));
                } else {
                    lines.push(Line::from(Span::styled("Bookings", heading)));
                    for booking in bookings {
                        lines.push(Line::from(format!(
                            "  hotel #{} {} · {} room(s) · records {:?}",
                            booking.hotel_id,
                            booking.hotel_name.as_deref().unwrap_or("(unknown hotel)"),
                            booking.rooms,
                            booking.records
                        )));
                    }
                }
                self.push_drift_lines(&mut lines, |drift| drift.customer_id == customer.id);
            }
            Detail::Reservation(reservation) => {
                lines.push(Line::from(Span::styled(
                    format!("Reservation #{}", reservation.id),
                    heading,
                )));
                lines.push(Line::from(vec![
                    Span::styled("Customer: ", label),
                    Span::raw(format!(
                        "#{} {}",
                        reservation.customer_id,
                        self.data
                            .customer_name(reservation.customer_id)
                            .unwrap_or("(unknown)")
                    )),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("Hotel: ", label),
                    Span::raw(format!(
                        "#{} {}",
                        reservation.hotel_id,
                        self.data
                            .hotel_name(reservation.hotel_id)
                            .unwrap_or("(unknown)")
                    )),
                ]));
                self.push_drift_lines(&mut lines, |drift| {
                    drift.hotel_id == reservation.hotel_id
                        && drift.customer_id == reservation.customer_id
                });
            }
        }

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn push_drift_lines<F>(&self, lines: &mut Vec<Line<'static>>, filter: F)
    where
        F: Fn(&LedgerDrift) -> bool,
    {
        let warning = Style::default().fg(self.theme.warning);
        for drift in self.data.drift.iter().filter(|drift| filter(drift)) {
            lines.push(Line::from(Span::styled(
                format!(
                    "! hotel #{} / customer #{}: {} room(s) but {} record(s)",
                    drift.hotel_id, drift.customer_id, drift.rooms, drift.records
                ),
                warning,
            )));
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let help = format!(
            "{} · Tab switch · Ctrl-r reload · q quit",
            self.state.tab.help()
        );
        let paragraph = Paragraph::new(vec![
            Line::from(self.state.status.clone()),
            Line::from(Span::styled(help, Style::default().fg(self.theme.muted))),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_form(&self, frame: &mut Frame, form: &FormModal) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(60_u16, frame_area.width.saturating_sub(4)), 24_u16);
        let height = (form.fields.len() as u16 * 2 + 4).min(frame_area.height);
        let area = centered_rect(width, height, frame_area);
        frame.render_widget(Clear, area);

        let mut lines = Vec::new();
        for (index, field) in form.fields.iter().enumerate() {
            let focused = index == form.focus;
            let label_style = if focused {
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.muted)
            };
            lines.push(Line::from(Span::styled(field.label, label_style)));
            lines.push(Line::from(vec![
                Span::styled("> ", Style::default().fg(self.theme.accent)),
                Span::raw(field.input.clone()),
            ]));
        }
        lines.push(Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" save  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" next field  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(form.title.clone()));
        frame.render_widget(paragraph, area);

        if let Some(field) = form.fields.get(form.focus) {
            let cursor_x = (area.x + 3 + field.cursor as u16)
                .min(area.x + area.width.saturating_sub(2));
            let cursor_y = area.y + 2 + form.focus as u16 * 2;
            frame.set_cursor(cursor_x, cursor_y);
        }
    }

    fn render_confirm(&self, frame: &mut Frame, confirm: &ConfirmModal) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(50_u16, frame_area.width.saturating_sub(4)), 24_u16);
        let area = centered_rect(width, 5, frame_area);
        frame.render_widget(Clear, area);

        let paragraph = Paragraph::new(vec![
            Line::from(confirm.message.clone()),
            Line::from(""),
            Line::from(vec![
                Span::styled("y", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" delete  "),
                Span::styled("n", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" keep"),
            ]),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confirm")
                .border_style(Style::default().fg(self.theme.danger)),
        )
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn required_text<'a>(input: &'a str, label: &str) -> Result<&'a str> {
    if input.is_empty() {
        return Err(anyhow!("{label} is required"));
    }
    Ok(input)
}

fn parse_number(input: &str, label: &str) -> Result<Option<u32>> {
    if input.is_empty() {
        return Ok(None);
    }
    input
        .parse::<u32>()
        .map(Some)
        .with_context(|| format!("{label} must be a whole number"))
}

fn required_number(input: &str, label: &str) -> Result<u32> {
    parse_number(input, label)?.ok_or_else(|| anyhow!("{label} is required"))
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    tab: Tab,
    cursors: [usize; 3],
    status: String,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: Tab::Hotels,
            cursors: [0; 3],
            status: "Ready".to_string(),
            should_quit: false,
        }
    }
}

impl UiState {
    fn cursor(&self) -> usize {
        self.cursors[self.tab.index()]
    }

    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn move_cursor(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.cursors[self.tab.index()] = 0;
            return;
        }
        let next = (self.cursor() as isize + delta).clamp(0, len as isize - 1);
        self.cursors[self.tab.index()] = next as usize;
    }

    fn move_to(&mut self, index: usize, len: usize) {
        self.cursors[self.tab.index()] = index.min(len.saturating_sub(1));
    }

    fn clamp_cursor(&mut self, tab: Tab, len: usize) {
        let cursor = &mut self.cursors[tab.index()];
        *cursor = (*cursor).min(len.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoteldesk_core::{
        CustomerManager, HotelManager, IdStrategy, MemoryStore, ReservationManager, UpdatePolicy,
    };

    fn app() -> DeskApp {
        let ledger = Ledger::new(
            HotelManager::with_store(MemoryStore::new(), IdStrategy::Sequence, UpdatePolicy::IgnoreEmpty),
            CustomerManager::with_store(
                MemoryStore::new(),
                IdStrategy::Sequence,
                UpdatePolicy::IgnoreEmpty,
            ),
            ReservationManager::with_store(MemoryStore::new(), IdStrategy::Sequence),
        );
        DeskApp::new(ledger, AppConfig::default())
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut DeskApp, text: &str) -> Result<()> {
        for ch in text.chars() {
            app.handle_form_key(key(KeyCode::Char(ch)))?;
        }
        Ok(())
    }

    #[test]
    fn form_field_edits_at_cursor() {
        let mut field = FormField::text("Name", "Htel");
        field.move_home();
        field.move_cursor(1);
        field.insert('ô');
        assert_eq!(field.input, "Hôtel");
        field.move_end();
        field.backspace();
        assert_eq!(field.input, "Hôte");
        field.move_home();
        field.delete();
        assert_eq!(field.value(), "ôte");
    }

    #[test]
    fn numeric_field_rejects_letters() {
        let mut field = FormField::number("Rooms", Some(2));
        field.insert('x');
        field.insert('5');
        assert_eq!(field.input, "25");
    }

    #[test]
    fn tabs_cycle_both_ways() {
        assert_eq!(Tab::Hotels.next(), Tab::Customers);
        assert_eq!(Tab::Reservations.next(), Tab::Hotels);
        assert_eq!(Tab::Hotels.prev(), Tab::Reservations);
    }

    #[test]
    fn numbers_parse_or_explain() {
        assert_eq!(parse_number("", "Rooms").unwrap(), None);
        assert_eq!(parse_number("12", "Rooms").unwrap(), Some(12));
        let err = parse_number("-1", "Rooms").unwrap_err();
        assert!(err.to_string().contains("Rooms must be a whole number"));
        assert!(required_number("", "Age").is_err());
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut state = UiState::default();
        state.move_cursor(5, 3);
        assert_eq!(state.cursor(), 2);
        state.move_cursor(-9, 3);
        assert_eq!(state.cursor(), 0);
        state.move_to(7, 3);
        state.clamp_cursor(Tab::Hotels, 1);
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn create_and_book_through_forms() -> Result<()> {
        let mut app = app();
        app.reload()?;

        app.handle_key(key(KeyCode::Char('a')))?;
        type_text(&mut app, "Budapest")?;
        app.handle_form_key(key(KeyCode::Tab))?;
        type_text(&mut app, "1")?;
        app.handle_form_key(key(KeyCode::Enter))?;
        assert!(app.form.is_none());
        assert_eq!(app.data.hotels.len(), 1);
        assert!(matches!(app.detail, Detail::Hotel(_)));

        app.handle_key(key(KeyCode::Char('b')))?;
        type_text(&mut app, "4")?;
        app.handle_form_key(key(KeyCode::Enter))?;
        assert_eq!(app.data.hotels[0].reserved_rooms(), 1);
        assert_eq!(app.data.reservations.len(), 1);

        app.handle_key(key(KeyCode::Char('b')))?;
        type_text(&mut app, "5")?;
        app.handle_form_key(key(KeyCode::Enter))?;
        assert!(app.form.is_some(), "refused booking keeps the form open");
        assert!(app.state.status.contains("no available rooms"));
        Ok(())
    }

    #[test]
    fn missing_required_field_is_reported() -> Result<()> {
        let mut app = app();
        app.switch_tab(Tab::Customers);
        app.handle_key(key(KeyCode::Char('a')))?;
        type_text(&mut app, "Dante")?;
        app.handle_form_key(key(KeyCode::Enter))?;
        assert!(app.state.status.contains("Age is required"));
        assert!(app.data.customers.is_empty());
        Ok(())
    }

    #[test]
    fn delete_requires_confirmation() -> Result<()> {
        let mut app = app();
        app.ledger.customers().add("Dante", 31)?;
        app.reload()?;
        app.switch_tab(Tab::Customers);

        app.handle_key(key(KeyCode::Char('d')))?;
        assert!(app.confirm.is_some());
        app.handle_confirm_key(key(KeyCode::Char('n')))?;
        assert_eq!(app.data.customers.len(), 1);

        app.handle_key(key(KeyCode::Char('d')))?;
        app.handle_confirm_key(key(KeyCode::Char('y')))?;
        assert!(app.data.customers.is_empty());
        assert_eq!(app.state.status, "Customer #1 deleted");
        Ok(())
    }
}
