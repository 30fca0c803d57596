//! In-memory `TableauApi` used by the tests.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Seek, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{DataSource, Group, PermissionRule, Project, Site, TableauApi, User, View, Workbook};
use crate::mcp::error::TableauError;

/// Lookups keyed by id that have no entry fail, so tests can exercise the
/// per-item error paths by leaving an id out.
#[derive(Default)]
pub struct StubTableau {
    pub auth_error: Option<String>,
    /// Operation names (e.g. `"workbooks"`) that fail with an API error.
    pub failing: HashSet<&'static str>,
    pub workbooks: Vec<Workbook>,
    pub views: HashMap<String, Vec<View>>,
    pub workbook_permissions: HashMap<String, Vec<PermissionRule>>,
    pub csv: HashMap<String, Vec<u8>>,
    pub images: HashMap<String, Vec<u8>>,
    pub datasources: Vec<DataSource>,
    pub datasource_content: HashMap<String, Vec<u8>>,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub group_members: HashMap<String, Vec<User>>,
    pub projects: Vec<Project>,
    pub project_permissions: HashMap<String, Vec<PermissionRule>>,
    pub site: Option<Site>,
    pub sign_ins: AtomicUsize,
}

fn fail(what: &str) -> TableauError {
    TableauError::Api { status: 500, message: format!("{what} unavailable") }
}

impl StubTableau {
    fn check(&self, op: &'static str) -> Result<(), TableauError> {
        if self.failing.contains(op) { Err(fail(op)) } else { Ok(()) }
    }

    fn keyed<T: Clone>(&self, op: &'static str, map: &HashMap<String, T>, id: &str) -> Result<T, TableauError> {
        self.check(op)?;
        map.get(id).cloned().ok_or_else(|| fail(&format!("{op} {id}")))
    }
}

#[async_trait]
impl TableauApi for StubTableau {
    async fn ensure_authenticated(&self) -> Result<(), TableauError> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        self.auth_error.as_ref().map_or(Ok(()), |e| Err(TableauError::NotAuthenticated(e.clone())))
    }

    async fn workbooks(&self) -> Result<Vec<Workbook>, TableauError> {
        self.check("workbooks")?;
        Ok(self.workbooks.clone())
    }

    async fn workbook(&self, workbook_id: &str) -> Result<Workbook, TableauError> {
        self.check("workbook")?;
        self.workbooks.iter().find(|w| w.id == workbook_id).cloned().ok_or_else(|| fail(workbook_id))
    }

    async fn workbook_views(&self, workbook_id: &str) -> Result<Vec<View>, TableauError> {
        self.keyed("workbook_views", &self.views, workbook_id)
    }

    async fn workbook_permissions(&self, workbook_id: &str) -> Result<Vec<PermissionRule>, TableauError> {
        self.keyed("workbook_permissions", &self.workbook_permissions, workbook_id)
    }

    async fn view(&self, view_id: &str) -> Result<View, TableauError> {
        self.check("view")?;
        self.views.values().flatten().find(|v| v.id == view_id).cloned().ok_or_else(|| fail(view_id))
    }

    async fn view_csv(&self, view_id: &str) -> Result<Vec<u8>, TableauError> {
        self.keyed("view_csv", &self.csv, view_id)
    }

    async fn view_image(&self, view_id: &str) -> Result<Vec<u8>, TableauError> {
        self.keyed("view_image", &self.images, view_id)
    }

    async fn datasources(&self) -> Result<Vec<DataSource>, TableauError> {
        self.check("datasources")?;
        Ok(self.datasources.clone())
    }

    async fn download_datasource(&self, datasource_id: &str, _include_extract: bool) -> Result<File, TableauError> {
        let content = self.keyed("download_datasource", &self.datasource_content, datasource_id)?;
        let mut file = tempfile::tempfile()?;
        file.write_all(&content)?;
        file.rewind()?;
        Ok(file)
    }

    async fn users(&self) -> Result<Vec<User>, TableauError> {
        self.check("users")?;
        Ok(self.users.clone())
    }

    async fn groups(&self) -> Result<Vec<Group>, TableauError> {
        self.check("groups")?;
        Ok(self.groups.clone())
    }

    async fn group_users(&self, group_id: &str) -> Result<Vec<User>, TableauError> {
        self.keyed("group_users", &self.group_members, group_id)
    }

    async fn projects(&self) -> Result<Vec<Project>, TableauError> {
        self.check("projects")?;
        Ok(self.projects.clone())
    }

    async fn project_permissions(&self, project_id: &str) -> Result<Vec<PermissionRule>, TableauError> {
        self.keyed("project_permissions", &self.project_permissions, project_id)
    }

    async fn site(&self) -> Result<Site, TableauError> {
        self.check("site")?;
        self.site.clone().ok_or_else(|| fail("site"))
    }

    async fn sign_out(&self) -> Result<(), TableauError> {
        Ok(())
    }
}

pub fn workbook(id: &str, name: &str) -> Workbook {
    Workbook { id: id.to_string(), name: name.to_string(), ..Workbook::default() }
}

pub fn view(id: &str, name: &str) -> View {
    View { id: id.to_string(), name: name.to_string(), content_url: None }
}

pub fn user(id: &str, name: &str) -> User {
    User { id: id.to_string(), name: name.to_string(), site_role: "Viewer".to_string(), ..User::default() }
}

pub fn group(id: &str, name: &str) -> Group {
    Group { id: id.to_string(), name: name.to_string(), domain: None }
}

pub fn datasource(id: &str, name: &str) -> DataSource {
    DataSource { id: id.to_string(), name: name.to_string(), ..DataSource::default() }
}

pub fn project(id: &str, name: &str) -> Project {
    Project { id: id.to_string(), name: name.to_string(), ..Project::default() }
}
