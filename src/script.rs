/// Modelo de roteiro e ciclo de vida dos rascunhos
/// A persistência fica fora do núcleo; a biblioteca em memória só aplica as regras

use chrono::{DateTime, Local, TimeDelta, Utc};

pub const UNTITLED: &str = "Roteiro sem título";

const TITLE_PREVIEW_CHARS: usize = 20;
const CONTENT_PREVIEW_CHARS: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct Script {
    pub id: ScriptId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Script {
    pub fn new(id: ScriptId, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Título, ou os primeiros 20 caracteres da primeira linha não vazia
    pub fn display_title(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        self.content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.chars().take(TITLE_PREVIEW_CHARS).collect())
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    /// Duas primeiras linhas unidas, cortadas em 50 caracteres
    pub fn preview_content(&self) -> String {
        let preview = self.content.lines().take(2).collect::<Vec<_>>().join(" ");
        preview.chars().take(CONTENT_PREVIEW_CHARS).collect()
    }

    pub fn formatted_date(&self) -> String {
        self.updated_at
            .with_timezone(&Local)
            .format("%Y.%m.%d %H:%M")
            .to_string()
    }

    pub fn is_draft(&self) -> bool {
        self.content.is_empty()
    }
}

/// Resultado de salvar uma edição
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Updated,
    /// Conteúdo vazio: o roteiro foi removido
    Deleted,
    Missing,
}

/// Biblioteca de roteiros em memória
#[derive(Default)]
pub struct ScriptLibrary {
    scripts: Vec<Script>,
    next_id: u64,
    last_stamp: Option<DateTime<Utc>>,
}

impl ScriptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ação "novo roteiro": cria um rascunho vazio
    pub fn create_draft(&mut self) -> ScriptId {
        let mut draft = Script::new(ScriptId(self.next_id), "", "");
        draft.created_at = self.stamp();
        draft.updated_at = draft.created_at;
        self.insert(draft)
    }

    /// Relógio estritamente crescente, para que a ordem da lista seja estável
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + TimeDelta::nanoseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    pub fn insert(&mut self, mut script: Script) -> ScriptId {
        script.id = ScriptId(self.next_id);
        self.next_id += 1;
        let id = script.id;
        self.scripts.push(script);
        id
    }

    pub fn get(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn save(&mut self, id: ScriptId, content: &str) -> SaveOutcome {
        if content.trim().is_empty() {
            return if self.delete(id) {
                SaveOutcome::Deleted
            } else {
                SaveOutcome::Missing
            };
        }
        let stamp = self.stamp();
        match self.scripts.iter_mut().find(|s| s.id == id) {
            Some(script) => {
                script.content = content.to_string();
                script.updated_at = stamp;
                SaveOutcome::Updated
            }
            None => SaveOutcome::Missing,
        }
    }

    /// Cancelar a edição descarta rascunhos que continuam vazios
    pub fn cancel_edit(&mut self, id: ScriptId) -> bool {
        match self.get(id) {
            Some(script) if script.is_draft() => self.delete(id),
            _ => false,
        }
    }

    pub fn delete(&mut self, id: ScriptId) -> bool {
        let before = self.scripts.len();
        self.scripts.retain(|s| s.id != id);
        before != self.scripts.len()
    }

    /// Mais recentes primeiro
    pub fn list(&self) -> Vec<&Script> {
        let mut list: Vec<&Script> = self.scripts.iter().collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        list
    }
}
