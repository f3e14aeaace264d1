/// Relógio de rolagem com passo fixo
/// Avança `altura_da_linha / segundos_por_linha` pixels por segundo em ticks de 1/TICK_RATE

use std::time::{Duration, Instant};

use crate::config::TICK_RATE;

pub struct ScrollClock {
    offset: f64,
    running: bool,
    /// Próximo tick agendado; `None` = timer cancelado
    next_tick: Option<Instant>,
    seconds_per_line: f32,
    line_height: f32,
    tick_rate: f32,
}

impl ScrollClock {
    pub fn new(seconds_per_line: f32, line_height: f32) -> Self {
        Self::with_tick_rate(seconds_per_line, line_height, TICK_RATE)
    }

    pub fn with_tick_rate(seconds_per_line: f32, line_height: f32, tick_rate: f32) -> Self {
        Self {
            offset: 0.0,
            running: false,
            next_tick: None,
            seconds_per_line,
            line_height,
            tick_rate,
        }
    }

    /// Pixels por segundo
    pub fn rate(&self) -> f64 {
        self.line_height as f64 / self.seconds_per_line as f64
    }

    /// Pixels somados a cada tick em execução
    pub fn per_tick_advance(&self) -> f64 {
        self.rate() / self.tick_rate as f64
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    pub fn offset(&self) -> f32 {
        self.offset as f32
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// O timer periódico está ativo
    pub fn is_scheduled(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Agenda o timer e coloca em execução; o offset é mantido
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.next_tick = Some(now + self.tick_interval());
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn toggle_pause(&mut self) {
        self.running = !self.running;
    }

    /// Volta ao topo e continua rolando
    pub fn restart(&mut self) {
        self.offset = 0.0;
        self.running = true;
    }

    pub fn reset(&mut self) {
        self.offset = 0.0;
    }

    /// Cancela o timer periódico (obrigatório ao fechar a view)
    pub fn stop(&mut self) {
        self.next_tick = None;
        self.running = false;
    }

    /// Um tick do timer
    pub fn tick(&mut self) {
        if self.next_tick.is_some() && self.running {
            self.offset += self.per_tick_advance();
        }
    }

    /// Executa todos os ticks vencidos até `now`. Retorna quantos foram consumidos
    pub fn advance_to(&mut self, now: Instant) -> u32 {
        let interval = self.tick_interval();
        let mut ticks = 0;
        while let Some(deadline) = self.next_tick {
            if deadline > now {
                break;
            }
            self.tick();
            self.next_tick = Some(deadline + interval);
            ticks += 1;
        }
        ticks
    }

    /// Próximo prazo para o loop de eventos acordar
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }
}
