//! Well-known mixin targets exposed by the panel.

pub const SERVER_CREATE: &str = "server.create";
pub const SERVER_UPDATE: &str = "server.update";
pub const SERVER_DELETE: &str = "server.delete";
pub const SERVER_START: &str = "server.start";
pub const SERVER_STOP: &str = "server.stop";
pub const SERVER_RESTART: &str = "server.restart";
pub const SERVER_KILL: &str = "server.kill";
pub const SERVER_SUSPEND: &str = "server.suspend";
pub const SERVER_UNSUSPEND: &str = "server.unsuspend";
pub const SERVER_REINSTALL: &str = "server.reinstall";
pub const SERVER_TRANSFER: &str = "server.transfer";
pub const SERVER_LIST: &str = "server.list";
pub const SERVER_GET: &str = "server.get";

pub const USER_CREATE: &str = "user.create";
pub const USER_UPDATE: &str = "user.update";
pub const USER_DELETE: &str = "user.delete";
pub const USER_AUTHENTICATE: &str = "user.authenticate";
pub const USER_BAN: &str = "user.ban";
pub const USER_UNBAN: &str = "user.unban";
pub const USER_LIST: &str = "user.list";
pub const USER_GET: &str = "user.get";

pub const DATABASE_CREATE: &str = "database.create";
pub const DATABASE_DELETE: &str = "database.delete";
pub const DATABASE_LIST: &str = "database.list";

pub const BACKUP_CREATE: &str = "backup.create";
pub const BACKUP_DELETE: &str = "backup.delete";
pub const BACKUP_LIST: &str = "backup.list";

pub const FILE_READ: &str = "file.read";
pub const FILE_WRITE: &str = "file.write";
pub const FILE_DELETE: &str = "file.delete";
pub const FILE_UPLOAD: &str = "file.upload";
pub const FILE_MOVE: &str = "file.move";
pub const FILE_COPY: &str = "file.copy";
pub const FILE_COMPRESS: &str = "file.compress";
pub const FILE_DECOMPRESS: &str = "file.decompress";
pub const FILE_LIST: &str = "file.list";

pub const NODE_CREATE: &str = "node.create";
pub const NODE_DELETE: &str = "node.delete";
pub const NODE_LIST: &str = "node.list";
pub const NODE_GET: &str = "node.get";

pub const PACKAGE_CREATE: &str = "package.create";
pub const PACKAGE_UPDATE: &str = "package.update";
pub const PACKAGE_DELETE: &str = "package.delete";
pub const PACKAGE_LIST: &str = "package.list";
pub const PACKAGE_GET: &str = "package.get";

pub const SUBUSER_ADD: &str = "subuser.add";
pub const SUBUSER_UPDATE: &str = "subuser.update";
pub const SUBUSER_REMOVE: &str = "subuser.remove";
pub const SUBUSER_LIST: &str = "subuser.list";

pub const IPBAN_CREATE: &str = "ipban.create";
pub const IPBAN_DELETE: &str = "ipban.delete";
pub const IPBAN_LIST: &str = "ipban.list";

pub const ALLOCATION_ADD: &str = "allocation.add";
pub const ALLOCATION_DELETE: &str = "allocation.delete";
pub const ALLOCATION_SET_PRIMARY: &str = "allocation.set_primary";
pub const ALLOCATION_LIST: &str = "allocation.list";

pub const DBHOST_CREATE: &str = "dbhost.create";
pub const DBHOST_UPDATE: &str = "dbhost.update";
pub const DBHOST_DELETE: &str = "dbhost.delete";
pub const DBHOST_LIST: &str = "dbhost.list";

pub const SETTINGS_UPDATE: &str = "settings.update";
pub const SETTINGS_GET: &str = "settings.get";

pub const ACTIVITYLOG_LIST: &str = "activitylog.list";

pub const CONSOLE_COMMAND: &str = "console.command";
